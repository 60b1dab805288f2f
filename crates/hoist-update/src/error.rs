//! Error types for hoist-update

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using hoist-update's error type
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Failures talking to the release feed or fetching artifacts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, DNS, TLS or server-side failure
    #[error("network error: {message}")]
    Network { message: String },

    /// The request exceeded its deadline
    #[error("request timed out after {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },

    /// The repository, release or asset does not exist
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Credentials are missing, invalid, or lack access
    #[error("unauthorized (HTTP {status}): {resource}")]
    Unauthorized { status: u16, resource: String },
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

/// What happened to the live installation after a failed commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Live files were never touched
    NotRequired,
    /// Live files were restored from the backup
    RolledBack,
    /// Restoring failed; the backup is still on disk
    Failed { reason: String },
}

impl std::fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackOutcome::NotRequired => f.write_str("installation untouched"),
            RollbackOutcome::RolledBack => f.write_str("previous version restored"),
            RollbackOutcome::Failed { reason } => write!(f, "rollback failed: {}", reason),
        }
    }
}

/// Errors produced while checking for, fetching, verifying or installing an update
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Version text that is not SemVer 2.0
    #[error("malformed version '{input}': {reason}")]
    MalformedVersion { input: String, reason: String },

    /// No asset of the release matches the hint
    #[error("release {release} has no asset matching {}", .hint.as_deref().unwrap_or("this platform"))]
    NoMatchingAsset {
        release: String,
        hint: Option<String>,
    },

    /// Several assets match and none can be preferred
    #[error("release {release} has several matching assets: {}", .candidates.join(", "))]
    AmbiguousAsset {
        release: String,
        candidates: Vec<String>,
    },

    /// Feed or download failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The downloaded stream ended before the declared size
    #[error("incomplete download of {asset}: expected {expected} bytes, got {actual}")]
    IncompleteDownload {
        asset: String,
        expected: u64,
        actual: u64,
    },

    /// Artifact digest differs from the published checksum
    #[error("checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },

    /// Signature is malformed or does not verify
    #[error("invalid signature for {asset}: {reason}")]
    SignatureInvalid { asset: String, reason: String },

    /// Signature verifies but the signer is not trusted
    #[error("{asset} is signed by an untrusted key ({signer})")]
    UntrustedSigner { asset: String, signer: String },

    /// Neither checksum nor signature is available and unverified installs are off
    #[error("{asset} has no checksum or signature to verify against")]
    UnverifiableAsset { asset: String },

    /// The staged artifact could not be unpacked
    #[error("failed to stage {asset}: {message}")]
    Staging { asset: String, message: String },

    /// Replacing the live installation failed
    #[error("commit failed: {reason} ({rollback})")]
    CommitFailed {
        reason: String,
        rollback: RollbackOutcome,
        backup: Option<PathBuf>,
    },

    /// Another apply is already running
    #[error("an update is already in progress")]
    UpdateInProgress,

    /// The caller cancelled the attempt before commit
    #[error("update cancelled")]
    Cancelled,

    /// Nothing to roll back to
    #[error("no backup is available to roll back to")]
    NoBackup,

    /// Neither an installed-version marker nor a configured current version exists
    #[error("the installed version is unknown; run `hoist init --version <VERSION>` or set update.current-version")]
    UnknownCurrentVersion,

    /// Invalid engine configuration
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// History store failure
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Filesystem failure outside a commit
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn commit_failed(
        reason: impl Into<String>,
        rollback: RollbackOutcome,
        backup: Option<PathBuf>,
    ) -> Self {
        Self::CommitFailed {
            reason: reason.into(),
            rollback,
            backup,
        }
    }

    /// Stable machine-readable name, stored in attempt history
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateError::MalformedVersion { .. } => "malformed_version",
            UpdateError::NoMatchingAsset { .. } => "no_matching_asset",
            UpdateError::AmbiguousAsset { .. } => "ambiguous_asset",
            UpdateError::Transport(TransportError::Network { .. }) => "network",
            UpdateError::Transport(TransportError::Timeout { .. }) => "timeout",
            UpdateError::Transport(TransportError::NotFound { .. }) => "not_found",
            UpdateError::Transport(TransportError::Unauthorized { .. }) => "unauthorized",
            UpdateError::IncompleteDownload { .. } => "incomplete_download",
            UpdateError::ChecksumMismatch { .. } => "checksum_mismatch",
            UpdateError::SignatureInvalid { .. } => "signature_invalid",
            UpdateError::UntrustedSigner { .. } => "untrusted_signer",
            UpdateError::UnverifiableAsset { .. } => "unverifiable_asset",
            UpdateError::Staging { .. } => "staging",
            UpdateError::CommitFailed { .. } => "commit_failed",
            UpdateError::UpdateInProgress => "update_in_progress",
            UpdateError::Cancelled => "cancelled",
            UpdateError::NoBackup => "no_backup",
            UpdateError::UnknownCurrentVersion => "unknown_current_version",
            UpdateError::Config { .. } => "config",
            UpdateError::History(_) => "history",
            UpdateError::Io(_) => "io",
        }
    }

    /// Transient failures the downloader retries once more
    pub fn is_retryable(&self) -> bool {
        match self {
            UpdateError::Transport(err) => err.is_retryable(),
            UpdateError::IncompleteDownload { .. } => true,
            _ => false,
        }
    }

    /// Integrity failures: the artifact must not be installed
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            UpdateError::ChecksumMismatch { .. }
                | UpdateError::SignatureInvalid { .. }
                | UpdateError::UntrustedSigner { .. }
                | UpdateError::UnverifiableAsset { .. }
        )
    }
}

impl From<hoist_core::Error> for UpdateError {
    fn from(err: hoist_core::Error) -> Self {
        match err {
            hoist_core::Error::MalformedVersion { input, reason } => {
                UpdateError::MalformedVersion { input, reason }
            }
            hoist_core::Error::Io(err) => UpdateError::Io(err),
            other => UpdateError::config(other.to_string()),
        }
    }
}

/// Failures of a history store
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode history record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("history store is unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(UpdateError::from(TransportError::network("reset")).is_retryable());
        assert!(UpdateError::from(TransportError::Timeout {
            timeout: Duration::from_secs(3)
        })
        .is_retryable());
        assert!(!UpdateError::from(TransportError::not_found("asset")).is_retryable());
        assert!(!UpdateError::Cancelled.is_retryable());
        assert!(UpdateError::IncompleteDownload {
            asset: "a".into(),
            expected: 10,
            actual: 3
        }
        .is_retryable());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(UpdateError::UpdateInProgress.kind(), "update_in_progress");
        assert_eq!(
            UpdateError::from(TransportError::Unauthorized {
                status: 401,
                resource: "x".into()
            })
            .kind(),
            "unauthorized"
        );
    }

    #[test]
    fn test_core_malformed_version_maps_across() {
        let core = hoist_core::SemanticVersion::parse("1.x").unwrap_err();
        assert!(matches!(
            UpdateError::from(core),
            UpdateError::MalformedVersion { ref input, .. } if input == "1.x"
        ));
    }

    #[test]
    fn test_commit_failed_display_mentions_rollback() {
        let err = UpdateError::commit_failed("disk full", RollbackOutcome::RolledBack, None);
        let text = err.to_string();
        assert!(text.contains("disk full"));
        assert!(text.contains("previous version restored"));
    }
}
