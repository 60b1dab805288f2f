//! Update engine: check, download, verify, stage, commit, record
//!
//! One apply runs per installation at a time. The claim is an in-process
//! mutex plus an exclusive lock on `<root>/.hoist.lock`, held from
//! `CandidateFound` until the attempt is recorded. A second caller, in this
//! process or another, is rejected with `UpdateInProgress` instead of
//! waiting. Every attempt that enters the state machine ends in exactly one
//! history record.

use crate::cancel::{cancellation, CancelHandle, CancelSignal};
use crate::download::Downloader;
use crate::error::{Result, TransportError, UpdateError};
use crate::history::{AttemptOutcome, FailureDetail, HistoryStore, UpdateAttempt};
use crate::install::{CommitStrategy, InstallLock, Installer, InstalledState};
use crate::releases::{
    select_asset_for, Asset, Checksum, Platform, RawRelease, Release, ReleaseCatalog,
};
use crate::staging::{StagedArtifact, StagingArea};
use crate::state::{StateTracker, UpdateState};
use crate::transport::{ReleaseTransport, RepoId};
use crate::verify::{
    parse_checksum_listing, TrustSet, VerificationMaterial, VerificationResult, Verifier,
};
use hoist_core::retry::{ClosurePredicate, RetryError, RetryExecutor, TracingObserver};
use hoist_core::types::{CommitStrategyPreference, RetryPolicy, RuntimeConfig};
use hoist_core::{SemanticVersion, UpdatePolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Everything the engine needs, resolved up front
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub repo: RepoId,
    pub policy: UpdatePolicy,
    pub asset_hint: Option<String>,
    /// Install assets that carry no checksum or signature
    pub allow_unverified: bool,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
    pub keep_backup: bool,
    pub release_limit: usize,
    pub download_retry: RetryPolicy,
    pub list_retry: RetryPolicy,
    pub install_root: PathBuf,
    pub strategy: CommitStrategyPreference,
    pub entry_name: Option<String>,
    pub trust: TrustSet,
    /// Used when the install root has no version marker yet
    pub current_version: Option<SemanticVersion>,
    pub show_progress: bool,
    pub platform: Platform,
}

impl EngineConfig {
    /// Defaults for `repo` installed at `install_root`
    pub fn new(repo: RepoId, install_root: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            policy: UpdatePolicy::default(),
            asset_hint: None,
            allow_unverified: false,
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(300),
            keep_backup: true,
            release_limit: 30,
            download_retry: RetryPolicy::default(),
            list_retry: RetryPolicy::default(),
            install_root: install_root.into(),
            strategy: CommitStrategyPreference::Auto,
            entry_name: None,
            trust: TrustSet::new(),
            current_version: None,
            show_progress: false,
            platform: Platform::current(),
        }
    }

    pub fn from_runtime(config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let repo: RepoId = config.feed.repo.parse()?;
        let install_root = config
            .install
            .root
            .clone()
            .ok_or_else(|| UpdateError::config("install.root is not set"))?;
        let trust = TrustSet::from_base64(
            config
                .update
                .trusted_keys
                .iter()
                .map(|(name, key)| (name.clone(), key)),
        )?;

        Ok(Self {
            repo,
            policy: config.update.policy,
            asset_hint: config.update.asset_hint.clone(),
            allow_unverified: config.update.allow_unverified,
            request_timeout: Duration::from_secs(config.network.request_timeout_secs),
            download_timeout: Duration::from_secs(config.network.download_timeout_secs),
            keep_backup: config.update.keep_backup,
            release_limit: config.feed.release_limit,
            download_retry: config.retry_policies.for_operation("download"),
            list_retry: config.retry_policies.for_operation("list-releases"),
            install_root,
            strategy: config.install.strategy,
            entry_name: config.install.entry_name.clone(),
            trust,
            current_version: config.update.current_version.clone(),
            show_progress: false,
            platform: Platform::current(),
        })
    }
}

/// A committed update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedResult {
    pub from: SemanticVersion,
    pub to: SemanticVersion,
    pub tag: String,
    pub asset: String,
    pub strategy: CommitStrategy,
    /// Directory now holding the live files
    pub location: PathBuf,
    /// Previous installation, kept until `confirm`
    pub backup: Option<PathBuf>,
    pub verification: VerificationResult,
}

/// Result of a full check-then-apply run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate { current: SemanticVersion },
    Applied(AppliedResult),
}

/// What one attempt learned, for its history record
#[derive(Debug)]
struct AttemptTrace {
    current: SemanticVersion,
    candidate: Option<SemanticVersion>,
    asset: Option<String>,
}

/// Claim on the installation: the in-process mutex plus the lock file
#[derive(Debug)]
struct ApplyGuard {
    _local: OwnedMutexGuard<()>,
    _install: InstallLock,
}

/// A running attempt, recorded exactly once
///
/// Owns the apply guard so the installation stays claimed until the record
/// is written. An attempt dropped before it finishes (its future was dropped)
/// is recorded as cancelled.
struct Attempt {
    trace: AttemptTrace,
    state: Arc<StateTracker>,
    history: Arc<dyn HistoryStore>,
    recorded: bool,
    _guard: ApplyGuard,
}

/// Output of the steps before commit
struct Prepared {
    version: SemanticVersion,
    asset: Asset,
    verification: VerificationResult,
    staging: StagingArea,
    staged: StagedArtifact,
}

/// Drives updates of one installation
pub struct UpdateEngine {
    config: EngineConfig,
    transport: Arc<dyn ReleaseTransport>,
    history: Arc<dyn HistoryStore>,
    installer: Installer,
    verifier: Verifier,
    downloader: Downloader,
    guard: Arc<Mutex<()>>,
    state: Arc<StateTracker>,
    cancel: CancelHandle,
}

impl UpdateEngine {
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn ReleaseTransport>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let installer = Installer::new(config.install_root.clone(), config.strategy);
        let verifier = Verifier::new(config.trust.clone()).allow_unverified(config.allow_unverified);
        let downloader = Downloader::new(config.download_timeout, config.download_retry.clone())
            .with_progress(config.show_progress);
        let (cancel, _) = cancellation();

        Self {
            config,
            transport,
            history,
            installer,
            verifier,
            downloader,
            guard: Arc::new(Mutex::new(())),
            state: Arc::new(StateTracker::new()),
            cancel,
        }
    }

    /// Replace the installer, e.g. to inject filesystem faults
    pub fn with_installer(mut self, installer: Installer) -> Self {
        self.installer = installer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    pub fn state(&self) -> UpdateState {
        self.state.current()
    }

    /// Watch state transitions of the running attempt
    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.state.subscribe()
    }

    /// Handle that cancels the running attempt before it commits
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The committed version, falling back to the configured one
    pub fn current_version(&self) -> Result<SemanticVersion> {
        match self.installer.installed_version()? {
            Some(version) => Ok(version),
            None => self
                .config
                .current_version
                .clone()
                .ok_or(UpdateError::UnknownCurrentVersion),
        }
    }

    pub fn installed_state(&self) -> Result<Option<InstalledState>> {
        self.installer.read_state()
    }

    /// Fetch and normalize the release feed
    pub async fn releases(&self) -> Result<ReleaseCatalog> {
        let executor = RetryExecutor::<UpdateError, _, _>::new(self.config.list_retry.clone())
            .with_predicate(ClosurePredicate::new(|e: &UpdateError| e.is_retryable()))
            .with_observer(TracingObserver::new(format!(
                "list releases of {}",
                self.config.repo
            )));

        let records = executor
            .execute(|| self.list_once())
            .await
            .map_err(RetryError::into_source)?;

        let catalog = ReleaseCatalog::from_raw(records);
        debug!("Feed {} lists {} releases", self.config.repo, catalog.len());
        Ok(catalog)
    }

    async fn list_once(&self) -> Result<Vec<RawRelease>> {
        let listing = self
            .transport
            .list_releases(&self.config.repo, self.config.release_limit);
        match tokio::time::timeout(self.config.request_timeout, listing).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TransportError::Timeout {
                timeout: self.config.request_timeout,
            }
            .into()),
        }
    }

    /// The best release acceptable under the configured policy
    ///
    /// Read-only: consults the feed and the committed version marker only.
    pub async fn check_for_update(&self, current: &SemanticVersion) -> Result<Option<Release>> {
        let catalog = self.releases().await?;
        let candidate = catalog
            .select_best_candidate(current, self.config.policy)
            .cloned();
        match &candidate {
            Some(release) => info!("Update available: {} -> {}", current, release.tag()),
            None => debug!("{} is up to date under {}", current, self.config.policy),
        }
        Ok(candidate)
    }

    /// Check, then apply the best candidate if there is one
    pub async fn update(&self) -> Result<UpdateOutcome> {
        let (mut attempt, cancel) = self.begin()?;

        let release = match self.check(&attempt.trace.current, &cancel).await {
            Ok(Some(release)) => release,
            Ok(None) => {
                let current = attempt.trace.current.clone();
                attempt.finish(None);
                return Ok(UpdateOutcome::UpToDate { current });
            }
            Err(err) => {
                attempt.finish(Some(&err));
                return Err(err);
            }
        };

        self.deliver(&release, attempt, &cancel)
            .await
            .map(UpdateOutcome::Applied)
    }

    /// Download, verify, stage and commit `release`
    pub async fn apply_update(&self, release: &Release) -> Result<AppliedResult> {
        let (attempt, cancel) = self.begin()?;
        self.state.advance(UpdateState::CandidateFound);
        self.deliver(release, attempt, &cancel).await
    }

    /// Restore the previous installation from the backup slot
    pub fn rollback(&self) -> Result<SemanticVersion> {
        let _guard = self.claim()?;
        self.installer.rollback()
    }

    /// Drop the backup slot once the new version is known to work
    pub fn confirm(&self) -> Result<Option<PathBuf>> {
        let _guard = self.claim()?;
        self.installer.confirm()
    }

    /// Recorded attempts, most recent first
    pub fn history(&self, limit: usize) -> Result<Vec<UpdateAttempt>> {
        Ok(self.history.query(limit)?)
    }

    /// Claim the installation without waiting, in this process and across processes
    fn claim(&self) -> Result<ApplyGuard> {
        let local = self
            .guard
            .clone()
            .try_lock_owned()
            .map_err(|_| UpdateError::UpdateInProgress)?;
        let install = self.installer.try_lock()?;
        Ok(ApplyGuard {
            _local: local,
            _install: install,
        })
    }

    /// Claim the installation and reset per-attempt state
    fn begin(&self) -> Result<(Attempt, CancelSignal)> {
        let guard = self.claim()?;
        let current = self.current_version()?;

        self.state.reset();
        self.cancel.reset();
        let attempt = Attempt {
            trace: AttemptTrace::new(current),
            state: self.state.clone(),
            history: self.history.clone(),
            recorded: false,
            _guard: guard,
        };
        Ok((attempt, self.cancel.signal()))
    }

    /// Move to `next` unless cancellation was requested
    fn enter(&self, next: UpdateState, cancel: &CancelSignal) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }
        self.state.advance(next);
        Ok(())
    }

    async fn check(
        &self,
        current: &SemanticVersion,
        cancel: &CancelSignal,
    ) -> Result<Option<Release>> {
        self.enter(UpdateState::Checking, cancel)?;

        let catalog = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
            catalog = self.releases() => catalog?,
        };

        let Some(release) = catalog
            .select_best_candidate(current, self.config.policy)
            .cloned()
        else {
            self.state.advance(UpdateState::UpToDate);
            return Ok(None);
        };

        info!("Update available: {} -> {}", current, release.tag());
        self.enter(UpdateState::CandidateFound, cancel)?;
        Ok(Some(release))
    }

    async fn deliver(
        &self,
        release: &Release,
        mut attempt: Attempt,
        cancel: &CancelSignal,
    ) -> Result<AppliedResult> {
        match self.prepare(release, &mut attempt.trace, cancel).await {
            Ok(prepared) => self.commit(release, prepared, attempt).await,
            Err(err) => {
                attempt.finish(Some(&err));
                Err(err)
            }
        }
    }

    /// Everything up to `Staged`; cancellable at each step
    async fn prepare(
        &self,
        release: &Release,
        trace: &mut AttemptTrace,
        cancel: &CancelSignal,
    ) -> Result<Prepared> {
        trace.candidate = release.version().cloned();
        let version = release
            .version()
            .cloned()
            .ok_or_else(|| UpdateError::MalformedVersion {
                input: release.tag().to_string(),
                reason: "release tag is not a semantic version".to_string(),
            })?;
        if version <= trace.current {
            warn!("Installing {} over {} which is not older", version, trace.current);
        }

        let asset = select_asset_for(
            release,
            self.config.asset_hint.as_deref(),
            &self.config.platform,
        )?
        .clone();
        trace.asset = Some(asset.name().to_string());

        self.enter(UpdateState::Downloading, cancel)?;
        let staging = StagingArea::create(&self.installer.layout().staging_dir())?;
        let artifact = staging.download_path(asset.name());
        self.downloader
            .download_to(self.transport.as_ref(), asset.link(), &artifact, cancel)
            .await?;
        let material = self.resolve_material(&asset, cancel).await?;
        self.enter(UpdateState::Downloaded, cancel)?;

        self.enter(UpdateState::Verifying, cancel)?;
        let verification = {
            let verifier = self.verifier.clone();
            let path = artifact.clone();
            let name = asset.name().to_string();
            tokio::task::spawn_blocking(move || verifier.verify_file(&path, &name, &material))
                .await
                .map_err(join_error)??
        };
        self.enter(UpdateState::Verified, cancel)?;

        self.enter(UpdateState::Staging, cancel)?;
        let (staging, staged) = {
            let asset = asset.clone();
            let verification = verification.clone();
            let entry_name = self.config.entry_name.clone();
            tokio::task::spawn_blocking(move || {
                let staged = staging.stage(&artifact, &asset, verification, entry_name.as_deref());
                (staging, staged)
            })
            .await
            .map_err(join_error)?
        };
        let staged = staged?;
        self.enter(UpdateState::Staged, cancel)?;

        Ok(Prepared {
            version,
            asset,
            verification,
            staging,
            staged,
        })
    }

    /// Replace the live files and record the attempt
    ///
    /// The blocking task owns the attempt and the staging area. Dropping this
    /// future cannot interrupt the commit, release the installation or lose
    /// the history record.
    async fn commit(
        &self,
        release: &Release,
        prepared: Prepared,
        attempt: Attempt,
    ) -> Result<AppliedResult> {
        let Prepared {
            version,
            asset,
            verification,
            staging,
            staged,
        } = prepared;

        self.state.advance(UpdateState::Committing);
        let installer = self.installer.clone();
        let state = self.state.clone();
        let from = attempt.trace.current.clone();
        let previous = from.clone();
        let target = version.clone();
        let keep_backup = self.config.keep_backup;

        let receipt = tokio::task::spawn_blocking(move || {
            let committed = installer.commit(&staged, &target, &previous, keep_backup);
            drop(staging);
            if committed.is_ok() {
                state.advance(UpdateState::Applied);
            }
            attempt.finish(committed.as_ref().err());
            committed
        })
        .await
        .map_err(join_error)??;

        Ok(AppliedResult {
            from,
            to: version,
            tag: release.tag().to_string(),
            asset: asset.name().to_string(),
            strategy: receipt.strategy,
            location: receipt.location,
            backup: receipt.backup,
            verification,
        })
    }

    /// Fetch the checksum and signature referenced by `asset`
    async fn resolve_material(
        &self,
        asset: &Asset,
        cancel: &CancelSignal,
    ) -> Result<VerificationMaterial> {
        let transport = self.transport.as_ref();

        let checksum = match asset.checksum() {
            None => None,
            Some(Checksum::Inline(digest)) => Some(digest.clone()),
            Some(Checksum::Sidecar { link, algorithm })
            | Some(Checksum::Manifest { link, algorithm }) => {
                let body = self.downloader.fetch_bytes(transport, link, cancel).await?;
                let text = String::from_utf8_lossy(&body);
                let digest = parse_checksum_listing(&text, asset.name(), *algorithm);
                if digest.is_none() {
                    warn!("{} has no usable {} entry for {}", link.name, algorithm, asset.name());
                }
                digest
            }
        };

        let signature = match asset.signature() {
            Some(link) => Some(self.downloader.fetch_bytes(transport, link, cancel).await?),
            None => None,
        };

        Ok(VerificationMaterial {
            checksum,
            signature,
        })
    }
}

impl AttemptTrace {
    fn new(current: SemanticVersion) -> Self {
        Self {
            current,
            candidate: None,
            asset: None,
        }
    }
}

impl Attempt {
    /// Record the terminal state and release the installation
    fn finish(mut self, error: Option<&UpdateError>) {
        self.record(error);
    }

    fn record(&mut self, error: Option<&UpdateError>) {
        if self.recorded {
            return;
        }
        self.recorded = true;

        let stage = self.state.current();
        let terminal = match error {
            None => stage,
            Some(UpdateError::Cancelled) if stage.can_transition_to(UpdateState::Cancelled) => {
                UpdateState::Cancelled
            }
            Some(_) => stage.failure_state(),
        };
        if terminal != stage {
            self.state.advance(terminal);
        }

        let Some(outcome) = terminal.outcome() else {
            error!("Update attempt ended in non-terminal state {}", terminal);
            self.state.reset();
            return;
        };

        let mut attempt = UpdateAttempt::new(self.trace.current.clone(), outcome)
            .with_candidate(self.trace.candidate.take())
            .with_asset(self.trace.asset.take());
        if let Some(err) = error {
            attempt = attempt.with_failure(FailureDetail::from_error(stage, err));
        }

        match (outcome, error) {
            (AttemptOutcome::Applied, _) => info!(
                "Applied {}",
                attempt
                    .candidate_version
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            ),
            (AttemptOutcome::UpToDate, _) => info!("{} is up to date", attempt.current_version),
            (_, Some(err)) => warn!("Update attempt {} at {}: {}", outcome, stage, err),
            (_, None) => warn!("Update attempt {} at {}", outcome, stage),
        }

        if let Err(e) = self.history.append(&attempt) {
            error!("Failed to record update attempt {}: {}", attempt.id, e);
        }
        self.state.advance(UpdateState::Idle);
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        if !self.recorded {
            warn!("Update attempt abandoned at {}", self.state.current());
            self.record(Some(&UpdateError::Cancelled));
        }
    }
}

fn join_error(err: tokio::task::JoinError) -> UpdateError {
    UpdateError::Io(std::io::Error::other(format!("update task failed: {}", err)))
}
