//! Live installation management: commit, rollback and the version marker
//!
//! Layout under the install root:
//!
//! ```text
//! <root>/
//!   current            live files (directory, or symlink into releases/)
//!   releases/          swap targets, one directory per committed version
//!   backups/           copies of `current` taken by copy-mode commits
//!   .staging/          per-attempt staging areas
//!   hoist-state.json   installed version and backup slot
//!   .hoist.lock        held while an update, rollback or confirm runs
//! ```
//!
//! A commit either swaps the `current` symlink in a single rename, or, where
//! that is not possible, copies the previous installation aside, copies the
//! new files in and restores the copy if anything fails part way.

use crate::error::{Result, RollbackOutcome, UpdateError};
use crate::staging::StagedArtifact;
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use hoist_core::types::CommitStrategyPreference;
use hoist_core::SemanticVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

const CURRENT_DIR: &str = "current";
const RELEASES_DIR: &str = "releases";
const BACKUPS_DIR: &str = "backups";
const STAGING_DIR: &str = ".staging";
const STATE_FILE: &str = "hoist-state.json";
const LOCK_FILE: &str = ".hoist.lock";

/// Paths of an installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current(&self) -> PathBuf {
        self.root.join(CURRENT_DIR)
    }

    pub fn releases_dir(&self) -> PathBuf {
        self.root.join(RELEASES_DIR)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

/// Exclusive claim on an installation, shared with other processes
///
/// The OS releases the lock when the file handle is closed, so dropping this
/// value (or the process exiting) frees the installation.
#[derive(Debug)]
pub struct InstallLock {
    _file: fs::File,
    path: PathBuf,
}

impl InstallLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// How a commit replaced the live files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitStrategy {
    /// `current` symlink swapped in one rename
    AtomicSwap,
    /// Files copied over a backed-up `current`
    CopyWithBackup,
}

impl fmt::Display for CommitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitStrategy::AtomicSwap => f.write_str("atomic-swap"),
            CommitStrategy::CopyWithBackup => f.write_str("copy-with-backup"),
        }
    }
}

/// The previous installation kept for rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSlot {
    pub version: SemanticVersion,
    pub path: PathBuf,
    pub strategy: CommitStrategy,
    pub created_at: DateTime<Utc>,
}

/// Contents of `hoist-state.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledState {
    pub version: SemanticVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupSlot>,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub version: SemanticVersion,
    pub strategy: CommitStrategy,
    /// Directory now holding the live files
    pub location: PathBuf,
    /// Backup retained until the new version is confirmed
    pub backup: Option<PathBuf>,
}

/// File copy primitive used while replacing live files
///
/// Swappable so tests can fail a commit half way through.
pub trait InstallFs: Send + Sync + fmt::Debug {
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;
}

/// `std::fs` backed copies
#[derive(Debug, Default, Clone, Copy)]
pub struct StdInstallFs;

impl InstallFs for StdInstallFs {
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }
}

/// Commits staged artifacts into an installation and undoes them
#[derive(Debug, Clone)]
pub struct Installer {
    layout: InstallLayout,
    preference: CommitStrategyPreference,
    fs: Arc<dyn InstallFs>,
}

impl Installer {
    pub fn new(root: impl Into<PathBuf>, preference: CommitStrategyPreference) -> Self {
        Self {
            layout: InstallLayout::new(root),
            preference,
            fs: Arc::new(StdInstallFs),
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn InstallFs>) -> Self {
        self.fs = fs;
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Claim the installation without waiting
    ///
    /// Fails with `UpdateInProgress` while another engine, in this process or
    /// any other, holds the claim.
    pub fn try_lock(&self) -> Result<InstallLock> {
        fs::create_dir_all(self.layout.root())?;
        let path = self.layout.lock_file();
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;
        if !file.try_lock_exclusive()? {
            debug!("{} is held by another update", path.display());
            return Err(UpdateError::UpdateInProgress);
        }
        Ok(InstallLock { _file: file, path })
    }

    /// Read the version marker; `None` when nothing was ever committed
    pub fn read_state(&self) -> Result<Option<InstalledState>> {
        let path = self.layout.state_file();
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data).map(Some).map_err(|e| {
            UpdateError::config(format!("corrupt install state {}: {}", path.display(), e))
        })
    }

    pub fn installed_version(&self) -> Result<Option<SemanticVersion>> {
        Ok(self.read_state()?.map(|state| state.version))
    }

    /// Record `version` as installed for an installation made outside hoist
    pub fn initialize(&self, version: SemanticVersion) -> Result<InstalledState> {
        fs::create_dir_all(self.layout.root())?;
        let state = InstalledState {
            version,
            asset: None,
            installed_at: Utc::now(),
            backup: None,
        };
        self.write_state(&state)?;
        info!("Marked {} as version {}", self.layout.root().display(), state.version);
        Ok(state)
    }

    /// The strategy a commit would use right now
    pub fn resolve_strategy(&self) -> CommitStrategy {
        let current = self.layout.current();
        let swappable = cfg!(unix)
            && match fs::symlink_metadata(&current) {
                Ok(meta) => meta.file_type().is_symlink(),
                Err(_) => true,
            };

        match self.preference {
            CommitStrategyPreference::Auto if swappable => CommitStrategy::AtomicSwap,
            CommitStrategyPreference::Auto => CommitStrategy::CopyWithBackup,
            CommitStrategyPreference::AtomicSwap if swappable => CommitStrategy::AtomicSwap,
            CommitStrategyPreference::AtomicSwap => {
                warn!("Atomic swap is unavailable for {}, copying instead", current.display());
                CommitStrategy::CopyWithBackup
            }
            CommitStrategyPreference::CopyWithBackup => CommitStrategy::CopyWithBackup,
        }
    }

    /// Make `staged` the live installation
    ///
    /// `previous` is the version being replaced. Any failure is reported as
    /// `CommitFailed` after the previous installation has been restored.
    pub fn commit(
        &self,
        staged: &StagedArtifact,
        version: &SemanticVersion,
        previous: &SemanticVersion,
        keep_backup: bool,
    ) -> Result<CommitReceipt> {
        let prior_state = self.read_state()?;
        let strategy = self.resolve_strategy();
        info!("Committing {} ({})", version, strategy);

        let receipt = match strategy {
            CommitStrategy::AtomicSwap => {
                self.commit_swap(staged, version, previous, keep_backup)?
            }
            CommitStrategy::CopyWithBackup => {
                self.commit_copy(staged, version, previous, keep_backup)?
            }
        };

        // The slot holds one backup; the one it replaces goes away
        if let Some(old) = prior_state.and_then(|s| s.backup) {
            if receipt.backup.as_deref() != Some(old.path.as_path()) && old.path != receipt.location
            {
                remove_path(&old.path);
            }
        }

        Ok(receipt)
    }

    #[cfg(unix)]
    fn commit_swap(
        &self,
        staged: &StagedArtifact,
        version: &SemanticVersion,
        previous: &SemanticVersion,
        keep_backup: bool,
    ) -> Result<CommitReceipt> {
        let not_required =
            |e: io::Error| UpdateError::commit_failed(e.to_string(), RollbackOutcome::NotRequired, None);

        let current = self.layout.current();
        let releases = self.layout.releases_dir();
        fs::create_dir_all(&releases).map_err(not_required)?;

        let dir_name = format!("{}-{}", version, short_id());
        let target = releases.join(&dir_name);
        fs::rename(&staged.location, &target).map_err(not_required)?;

        let old_target = fs::read_link(&current)
            .ok()
            .map(|link| self.layout.root().join(link));

        if let Err(e) = self.point_current_at(&Path::new(RELEASES_DIR).join(&dir_name)) {
            remove_path(&target);
            return Err(not_required(e));
        }
        debug!("Swapped {} -> {}", current.display(), target.display());

        let backup = match &old_target {
            Some(old) if keep_backup => Some(BackupSlot {
                version: previous.clone(),
                path: old.clone(),
                strategy: CommitStrategy::AtomicSwap,
                created_at: Utc::now(),
            }),
            _ => None,
        };

        let state = InstalledState {
            version: version.clone(),
            asset: Some(staged.asset.name().to_string()),
            installed_at: Utc::now(),
            backup: backup.clone(),
        };

        if let Err(e) = self.write_state(&state) {
            error!("Failed to record installed version: {}", e);
            let rollback = match &old_target {
                Some(old) => {
                    let relative = old.strip_prefix(self.layout.root()).unwrap_or(old);
                    match self.point_current_at(relative) {
                        Ok(()) => RollbackOutcome::RolledBack,
                        Err(restore) => RollbackOutcome::Failed {
                            reason: restore.to_string(),
                        },
                    }
                }
                None => match fs::remove_file(&current) {
                    Ok(()) => RollbackOutcome::RolledBack,
                    Err(restore) => RollbackOutcome::Failed {
                        reason: restore.to_string(),
                    },
                },
            };
            if rollback == RollbackOutcome::RolledBack {
                remove_path(&target);
            }
            return Err(UpdateError::commit_failed(
                format!("failed to record installed version: {}", e),
                rollback,
                old_target,
            ));
        }

        if !keep_backup {
            if let Some(old) = &old_target {
                remove_path(old);
            }
        }

        Ok(CommitReceipt {
            version: version.clone(),
            strategy: CommitStrategy::AtomicSwap,
            location: target,
            backup: backup.map(|slot| slot.path),
        })
    }

    #[cfg(not(unix))]
    fn commit_swap(
        &self,
        staged: &StagedArtifact,
        version: &SemanticVersion,
        previous: &SemanticVersion,
        keep_backup: bool,
    ) -> Result<CommitReceipt> {
        self.commit_copy(staged, version, previous, keep_backup)
    }

    /// Replace the `current` symlink with one pointing at `relative`
    #[cfg(unix)]
    fn point_current_at(&self, relative: &Path) -> io::Result<()> {
        let link = self.layout.root().join(format!(".current-{}", short_id()));
        std::os::unix::fs::symlink(relative, &link)?;
        fs::rename(&link, self.layout.current()).inspect_err(|_| {
            let _ = fs::remove_file(&link);
        })
    }

    fn commit_copy(
        &self,
        staged: &StagedArtifact,
        version: &SemanticVersion,
        previous: &SemanticVersion,
        keep_backup: bool,
    ) -> Result<CommitReceipt> {
        let current = self.layout.current();
        let had_current = current.exists();

        // Snapshot first; nothing live has been touched if this fails
        let backup_dir = if had_current {
            let dir = self.layout.backups_dir().join(format!(
                "{}-{}-{}",
                previous,
                Utc::now().format("%Y%m%d-%H%M%S"),
                short_id()
            ));
            if let Err(e) = self.copy_tree(&current, &dir) {
                remove_path(&dir);
                return Err(UpdateError::commit_failed(
                    format!("failed to back up {}: {}", current.display(), e),
                    RollbackOutcome::NotRequired,
                    None,
                ));
            }
            debug!("Backed up {} to {}", current.display(), dir.display());
            Some(dir)
        } else {
            None
        };

        let state = InstalledState {
            version: version.clone(),
            asset: Some(staged.asset.name().to_string()),
            installed_at: Utc::now(),
            backup: match &backup_dir {
                Some(path) if keep_backup => Some(BackupSlot {
                    version: previous.clone(),
                    path: path.clone(),
                    strategy: CommitStrategy::CopyWithBackup,
                    created_at: Utc::now(),
                }),
                _ => None,
            },
        };

        let applied = self
            .replace_contents(&staged.location, &current)
            .and_then(|()| self.write_state(&state));

        if let Err(e) = applied {
            error!("Commit of {} failed, restoring previous files: {}", version, e);
            let rollback = match self.restore_from(backup_dir.as_deref(), &current) {
                Ok(()) => RollbackOutcome::RolledBack,
                Err(restore) => {
                    error!("Restore failed: {}", restore);
                    RollbackOutcome::Failed {
                        reason: restore.to_string(),
                    }
                }
            };
            return Err(UpdateError::commit_failed(e.to_string(), rollback, backup_dir));
        }

        if !keep_backup {
            if let Some(dir) = &backup_dir {
                remove_path(dir);
            }
        }

        Ok(CommitReceipt {
            version: version.clone(),
            strategy: CommitStrategy::CopyWithBackup,
            location: current,
            backup: state.backup.map(|slot| slot.path),
        })
    }

    /// Copy `source` over `dest` file by file, then drop files `source` lacks
    fn replace_contents(&self, source: &Path, dest: &Path) -> io::Result<()> {
        fs::create_dir_all(dest)?;
        let kept = self.copy_tree(source, dest)?;

        for entry in WalkDir::new(dest).min_depth(1).contents_first(true) {
            let entry = entry.map_err(io::Error::other)?;
            let relative = entry.path().strip_prefix(dest).map_err(io::Error::other)?;
            if kept.contains(relative) {
                continue;
            }
            if entry.file_type().is_dir() {
                if fs::read_dir(entry.path())?.next().is_none() {
                    fs::remove_dir(entry.path())?;
                }
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Put the backup back in place of `current`
    fn restore_from(&self, backup: Option<&Path>, current: &Path) -> io::Result<()> {
        if current.exists() {
            fs::remove_dir_all(current)?;
        }
        match backup {
            Some(backup) => self.copy_tree(backup, current).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Recursively copy `from` into `to`, returning the relative paths copied
    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<HashSet<PathBuf>> {
        fs::create_dir_all(to)?;
        let mut copied = HashSet::new();

        for entry in WalkDir::new(from).min_depth(1) {
            let entry = entry.map_err(io::Error::other)?;
            let relative = entry
                .path()
                .strip_prefix(from)
                .map_err(io::Error::other)?
                .to_path_buf();
            let target = to.join(&relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target)?;
            } else if file_type.is_symlink() {
                copy_symlink(entry.path(), &target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                self.fs.copy_file(entry.path(), &target)?;
            }
            copied.insert(relative);
        }
        Ok(copied)
    }

    /// Restore the backup slot as the live installation
    pub fn rollback(&self) -> Result<SemanticVersion> {
        let state = self.read_state()?.ok_or(UpdateError::NoBackup)?;
        let slot = state.backup.ok_or(UpdateError::NoBackup)?;
        if !slot.path.exists() {
            return Err(UpdateError::NoBackup);
        }
        info!("Rolling back {} -> {}", state.version, slot.version);

        match slot.strategy {
            #[cfg(unix)]
            CommitStrategy::AtomicSwap => {
                let abandoned = fs::read_link(self.layout.current())
                    .ok()
                    .map(|link| self.layout.root().join(link));
                let relative = slot
                    .path
                    .strip_prefix(self.layout.root())
                    .unwrap_or(&slot.path)
                    .to_path_buf();
                self.point_current_at(&relative)?;
                if let Some(abandoned) = abandoned {
                    remove_path(&abandoned);
                }
            }
            _ => {
                let current = self.layout.current();
                self.restore_from(Some(&slot.path), &current)?;
                remove_path(&slot.path);
            }
        }

        self.write_state(&InstalledState {
            version: slot.version.clone(),
            asset: None,
            installed_at: Utc::now(),
            backup: None,
        })?;
        Ok(slot.version)
    }

    /// Discard the backup slot once the new version is known to work
    pub fn confirm(&self) -> Result<Option<PathBuf>> {
        let Some(mut state) = self.read_state()? else {
            return Ok(None);
        };
        let Some(slot) = state.backup.take() else {
            return Ok(None);
        };
        remove_path(&slot.path);
        self.write_state(&state)?;
        info!("Confirmed version {}, removed backup {}", state.version, slot.path.display());
        Ok(Some(slot.path))
    }

    /// Write the marker via a temp file and rename
    fn write_state(&self, state: &InstalledState) -> io::Result<()> {
        let path = self.layout.state_file();
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(state).map_err(io::Error::other)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Best-effort removal of a file, symlink or directory
fn remove_path(path: &Path) {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };
    if let Err(e) = result {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
