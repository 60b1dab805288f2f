//! In-memory release transport

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use hoist_update::{AssetDownload, AssetLink, RawRelease, ReleaseTransport, RepoId, TransportError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::builders::asset_url;

/// Serves a fixed feed and asset bodies keyed by URL
#[derive(Debug, Default)]
pub struct MockTransport {
    releases: Mutex<Vec<RawRelease>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, Vec<TransportError>>>,
    listing_error: Mutex<Option<TransportError>>,
    stall_downloads: AtomicBool,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_release(self, release: RawRelease) -> Self {
        self.releases.lock().unwrap().push(release);
        self
    }

    /// Serve `body` for asset `name` of release `tag`
    pub fn with_file(self, tag: &str, name: &str, body: impl Into<Vec<u8>>) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(asset_url(tag, name), body.into());
        self
    }

    /// Fail the next fetches of an asset with `errors`, in order
    pub fn failing_fetch(self, tag: &str, name: &str, errors: Vec<TransportError>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(asset_url(tag, name), errors);
        self
    }

    pub fn failing_listing(self, error: TransportError) -> Self {
        *self.listing_error.lock().unwrap() = Some(error);
        self
    }

    /// Send the first byte of every download, then hang
    pub fn stalling(self) -> Self {
        self.stall_downloads.store(true, Ordering::SeqCst);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseTransport for MockTransport {
    async fn list_releases(
        &self,
        _repo: &RepoId,
        limit: usize,
    ) -> Result<Vec<RawRelease>, TransportError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if let Some(error) = self.listing_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_asset(&self, link: &AssetLink) -> Result<AssetDownload, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if let Some(queued) = self.failures.lock().unwrap().get_mut(&link.url) {
            if !queued.is_empty() {
                return Err(queued.remove(0));
            }
        }

        let body = self
            .files
            .lock()
            .unwrap()
            .get(&link.url)
            .cloned()
            .ok_or_else(|| TransportError::not_found(link.name.clone()))?;
        let declared_size = Some(body.len() as u64);

        let stream = if self.stall_downloads.load(Ordering::SeqCst) {
            let first = Bytes::copy_from_slice(&body[..1.min(body.len())]);
            stream::once(async move { Ok(first) })
                .chain(stream::pending::<Result<Bytes, TransportError>>())
                .boxed()
        } else {
            let chunks: Vec<Result<Bytes, TransportError>> = body
                .chunks(7)
                .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                .collect();
            stream::iter(chunks).boxed()
        };

        Ok(AssetDownload {
            declared_size,
            stream,
        })
    }
}
