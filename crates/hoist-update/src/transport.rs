//! Release feed transport
//!
//! `ReleaseTransport` is the only way the engine reaches the network. The
//! GitHub implementation lists releases through the REST API and streams
//! asset bodies; tests substitute an in-memory transport.

use crate::error::{TransportError, UpdateError};
use crate::releases::{AssetLink, RawRelease};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use hoist_core::types::RuntimeConfig;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// An `OWNER/NAME` repository identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(owner, name))
            }
            _ => Err(UpdateError::config(format!(
                "repository '{}' must have the form OWNER/NAME",
                s
            ))),
        }
    }
}

/// An open artifact download
pub struct AssetDownload {
    /// Size announced by the server, when known
    pub declared_size: Option<u64>,
    /// Body chunks in order
    pub stream: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl fmt::Debug for AssetDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetDownload")
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}

/// Source of release metadata and artifact bytes
#[async_trait]
pub trait ReleaseTransport: Send + Sync {
    /// Releases of `repo`, newest first, at most `limit`
    async fn list_releases(
        &self,
        repo: &RepoId,
        limit: usize,
    ) -> Result<Vec<RawRelease>, TransportError>;

    /// Open a download of the file behind `link`
    async fn fetch_asset(&self, link: &AssetLink) -> Result<AssetDownload, TransportError>;
}

/// GitHub releases over HTTPS
pub struct GitHubTransport {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    request_timeout: Duration,
}

impl GitHubTransport {
    /// Build from runtime config; the token is read from `feed.token-env`
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, UpdateError> {
        Self::new(
            &config.feed.api_url,
            &config.network.user_agent,
            Duration::from_secs(config.network.request_timeout_secs),
            config.feed.token(),
        )
    }

    pub fn new(
        api_url: &str,
        user_agent: &str,
        request_timeout: Duration,
        token: Option<String>,
    ) -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| UpdateError::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            request_timeout,
        })
    }

    fn request(&self, url: &str, accept: &'static str) -> reqwest::RequestBuilder {
        let request = self.client.get(url).header(ACCEPT, accept);
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                timeout: self.request_timeout,
            }
        } else {
            TransportError::network(err.to_string())
        }
    }

    fn check_status(status: StatusCode, resource: &str) -> Result<(), TransportError> {
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(TransportError::not_found(resource)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TransportError::Unauthorized {
                status: status.as_u16(),
                resource: resource.to_string(),
            }),
            s => Err(TransportError::network(format!(
                "HTTP {} for {}",
                s.as_u16(),
                resource
            ))),
        }
    }
}

#[async_trait]
impl ReleaseTransport for GitHubTransport {
    async fn list_releases(
        &self,
        repo: &RepoId,
        limit: usize,
    ) -> Result<Vec<RawRelease>, TransportError> {
        let url = format!(
            "{}/repos/{}/{}/releases?per_page={}",
            self.api_url,
            repo.owner,
            repo.name,
            limit.clamp(1, 100)
        );
        debug!("Fetching releases from: {}", url);

        let response = self
            .request(&url, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        Self::check_status(response.status(), &format!("releases of {}", repo))?;

        let mut releases: Vec<RawRelease> = response
            .json()
            .await
            .map_err(|e| TransportError::network(format!("invalid release feed: {}", e)))?;
        releases.truncate(limit);
        Ok(releases)
    }

    async fn fetch_asset(&self, link: &AssetLink) -> Result<AssetDownload, TransportError> {
        debug!("Downloading {} from {}", link.name, link.url);

        let response = self
            .request(&link.url, "application/octet-stream")
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        Self::check_status(response.status(), &link.name)?;

        let declared_size = response
            .content_length()
            .or(if link.size > 0 { Some(link.size) } else { None });

        let timeout = self.request_timeout;
        let stream = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| {
                    if e.is_timeout() {
                        TransportError::Timeout { timeout }
                    } else {
                        TransportError::network(e.to_string())
                    }
                })
            })
            .boxed();

        Ok(AssetDownload {
            declared_size,
            stream,
        })
    }
}
