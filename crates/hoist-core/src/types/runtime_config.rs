//! Runtime configuration types
//!
//! These types define everything the update engine needs at construction:
//! network timeouts, retry policies, the release feed, update rules, the
//! installation layout and where attempt history is kept.

use crate::error::{Error, Result};
use crate::policy::UpdatePolicy;
use crate::version::SemanticVersion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Retry policy configurations
    #[serde(default)]
    pub retry_policies: RetryPoliciesConfig,

    /// Release feed settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Update selection and verification rules
    #[serde(default)]
    pub update: UpdateConfig,

    /// Installation layout
    #[serde(default)]
    pub install: InstallConfig,

    /// Attempt history storage
    #[serde(default)]
    pub history: HistoryConfig,
}

impl RuntimeConfig {
    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        if self.network.request_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "network.request-timeout-secs must be greater than zero",
            ));
        }
        if self.network.download_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "network.download-timeout-secs must be greater than zero",
            ));
        }
        if self.feed.release_limit == 0 {
            return Err(Error::invalid_config(
                "feed.release-limit must be greater than zero",
            ));
        }

        let repo = self.feed.repo.trim();
        if repo.is_empty() {
            return Err(Error::invalid_config(
                "feed.repo is not set (expected OWNER/NAME)",
            ));
        }
        match repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {}
            _ => {
                return Err(Error::invalid_config(format!(
                    "feed.repo '{}' must have the form OWNER/NAME",
                    repo
                )))
            }
        }

        let policies = self
            .retry_policies
            .operations
            .iter()
            .map(|(name, policy)| (name.as_str(), policy))
            .chain(std::iter::once(("default", &self.retry_policies.default)));
        for (name, policy) in policies {
            if policy.max_attempts == 0 {
                return Err(Error::invalid_config(format!(
                    "retry policy '{}' must allow at least one attempt",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// Timeout for feed queries in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for a single artifact download attempt in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            download_timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}
fn default_download_timeout() -> u64 {
    300 // 5 minutes
}
fn default_user_agent() -> String {
    format!(
        "hoist/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Retry policy configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPoliciesConfig {
    /// Default retry policy
    #[serde(default)]
    pub default: RetryPolicy,

    /// Per-operation retry policies
    #[serde(default)]
    pub operations: HashMap<String, RetryPolicy>,
}

impl RetryPoliciesConfig {
    /// Policy for a named operation, falling back to the default
    pub fn for_operation(&self, operation: &str) -> RetryPolicy {
        self.operations
            .get(operation)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for RetryPoliciesConfig {
    fn default() -> Self {
        let mut operations = HashMap::new();

        // One internal retry for transient failures
        let bounded = RetryPolicy {
            max_attempts: 2,
            strategy: RetryStrategy::FixedDelay,
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        };
        operations.insert("download".to_string(), bounded.clone());
        operations.insert("list-releases".to_string(), bounded);

        Self {
            default: RetryPolicy::default(),
            operations,
        }
    }
}

/// Retry policy for an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            strategy: RetryStrategy::None,
            ..Self::default()
        }
    }
}

fn default_max_attempts() -> u32 {
    2
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    5000
}

/// Retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// Retry immediately
    None,

    /// Fixed delay between retries
    #[default]
    FixedDelay,

    /// Exponential backoff
    ExponentialBackoff,

    /// Linear backoff
    LinearBackoff,
}

/// Release feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeedConfig {
    /// Base URL for the GitHub API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Repository publishing the releases, as OWNER/NAME
    #[serde(default)]
    pub repo: String,

    /// How many releases to request per check
    #[serde(default = "default_release_limit")]
    pub release_limit: usize,

    /// Environment variable holding an API token for private repositories
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            repo: String::new(),
            release_limit: default_release_limit(),
            token_env: default_token_env(),
        }
    }
}

impl FeedConfig {
    /// Read the API token from the configured environment variable
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_release_limit() -> usize {
    30
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

/// Update selection and verification rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdateConfig {
    /// Which newer versions are acceptable
    #[serde(default)]
    pub policy: UpdatePolicy,

    /// Case-insensitive substring selecting the release asset
    #[serde(default)]
    pub asset_hint: Option<String>,

    /// Install assets that carry neither checksum nor signature
    #[serde(default)]
    pub allow_unverified: bool,

    /// Keep the previous installation until it is confirmed or rolled back
    #[serde(default = "default_keep_backup")]
    pub keep_backup: bool,

    /// Version assumed when no installed-version marker exists yet
    #[serde(default)]
    pub current_version: Option<SemanticVersion>,

    /// Trusted Ed25519 signer keys, base64 encoded, by display name
    #[serde(default)]
    pub trusted_keys: BTreeMap<String, String>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            policy: UpdatePolicy::default(),
            asset_hint: None,
            allow_unverified: false,
            keep_backup: default_keep_backup(),
            current_version: None,
            trusted_keys: BTreeMap::new(),
        }
    }
}

fn default_keep_backup() -> bool {
    true
}

/// How new files replace the live installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitStrategyPreference {
    /// Atomic swap where the platform and layout allow it, copy otherwise
    #[default]
    Auto,
    /// Always swap the `current` link
    AtomicSwap,
    /// Always copy over the live files after taking a backup
    CopyWithBackup,
}

/// Installation layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstallConfig {
    /// Directory holding `current`, `releases/`, `backups/` and the state marker
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Commit strategy
    #[serde(default)]
    pub strategy: CommitStrategyPreference,

    /// File name for single-file (non-archive) artifacts
    #[serde(default)]
    pub entry_name: Option<String>,
}

/// Attempt history storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HistoryConfig {
    /// JSONL file receiving one record per attempt
    #[serde(default)]
    pub path: Option<PathBuf>,
}
