//! Self-update engine for Hoist
//!
//! Provides:
//! - Release feed normalization and policy-driven candidate selection
//! - Artifact download with timeout, bounded retry and cancellation
//! - SHA-256/SHA-512 checksum and Ed25519 signature verification (fail closed)
//! - Staging and atomic commit with copy-with-backup fallback and rollback
//! - Append-only history of update attempts

pub mod cancel;
pub mod download;
pub mod engine;
pub mod error;
pub mod history;
pub mod install;
pub mod releases;
pub mod staging;
pub mod state;
pub mod transport;
pub mod verify;

pub use cancel::{cancellation, CancelHandle, CancelSignal};
pub use download::Downloader;
pub use engine::{AppliedResult, EngineConfig, UpdateEngine, UpdateOutcome};
pub use error::{HistoryError, Result, RollbackOutcome, TransportError, UpdateError};
pub use history::{
    AttemptOutcome, FailureDetail, HistoryStore, JsonlHistoryStore, MemoryHistoryStore,
    UpdateAttempt,
};
pub use install::{
    CommitReceipt, CommitStrategy, InstallFs, InstallLock, InstalledState, Installer,
};
pub use releases::{Asset, AssetLink, Platform, RawAsset, RawRelease, Release, ReleaseCatalog, ReleaseVerdict};
pub use staging::{StagedArtifact, StagingArea};
pub use state::UpdateState;
pub use transport::{AssetDownload, GitHubTransport, ReleaseTransport, RepoId};
pub use verify::{Digest, DigestAlgorithm, SignatureEnvelope, TrustSet, VerificationResult, Verifier};

/// Current Hoist version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
