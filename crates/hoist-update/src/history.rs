//! Update attempt history
//!
//! One `UpdateAttempt` is appended per terminal state of the engine. Records
//! are never edited; `JsonlHistoryStore::prune` is the only way to drop them
//! and it is never called by the engine itself.

use crate::error::{HistoryError, UpdateError};
use crate::state::UpdateState;
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use hoist_core::SemanticVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Terminal state reached by an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Applied,
    UpToDate,
    CheckFailed,
    DownloadFailed,
    VerificationFailed,
    CommitFailed,
    Cancelled,
}

impl AttemptOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, AttemptOutcome::Applied | AttemptOutcome::UpToDate)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Applied => "applied",
            AttemptOutcome::UpToDate => "up_to_date",
            AttemptOutcome::CheckFailed => "check_failed",
            AttemptOutcome::DownloadFailed => "download_failed",
            AttemptOutcome::VerificationFailed => "verification_failed",
            AttemptOutcome::CommitFailed => "commit_failed",
            AttemptOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong, in enough detail to diagnose without re-running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Last state entered before the failure
    pub stage: UpdateState,
    /// Stable error kind, see `UpdateError::kind`
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

impl FailureDetail {
    pub fn from_error(stage: UpdateState, error: &UpdateError) -> Self {
        let (rollback, backup) = match error {
            UpdateError::CommitFailed {
                rollback, backup, ..
            } => (Some(rollback.to_string()), backup.clone()),
            _ => (None, None),
        };
        Self {
            stage,
            kind: error.kind().to_string(),
            message: error.to_string(),
            rollback,
            backup,
        }
    }
}

/// One recorded invocation of the update flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAttempt {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub current_version: SemanticVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_version: Option<SemanticVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
}

impl UpdateAttempt {
    pub fn new(current_version: SemanticVersion, outcome: AttemptOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            current_version,
            candidate_version: None,
            asset: None,
            outcome,
            failure: None,
        }
    }

    pub fn with_candidate(mut self, version: Option<SemanticVersion>) -> Self {
        self.candidate_version = version;
        self
    }

    pub fn with_asset(mut self, asset: Option<String>) -> Self {
        self.asset = asset;
        self
    }

    pub fn with_failure(mut self, failure: FailureDetail) -> Self {
        self.failure = Some(failure);
        self
    }
}

/// Append-only record of update attempts
pub trait HistoryStore: Send + Sync {
    fn append(&self, attempt: &UpdateAttempt) -> Result<(), HistoryError>;

    /// Up to `limit` attempts, most recent first
    fn query(&self, limit: usize) -> Result<Vec<UpdateAttempt>, HistoryError>;
}

/// History kept as one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonlHistoryStore {
    path: PathBuf,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_all(&self) -> Result<Vec<UpdateAttempt>, HistoryError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut attempts = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<UpdateAttempt>(&line) {
                Ok(attempt) => attempts.push(attempt),
                Err(e) => warn!(
                    "Skipping unreadable history line {} in {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(attempts)
    }

    /// Keep only the `keep_last` most recent attempts, returning how many were dropped
    ///
    /// Rewrites the file in place under the same exclusive lock `append`
    /// takes, so an append either lands before the read or after the rewrite.
    pub fn prune(&self, keep_last: usize) -> Result<usize, HistoryError> {
        let mut file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(self.io_error(e)),
        };
        // Released when `file` is dropped
        file.lock_exclusive().map_err(|e| self.io_error(e))?;

        let attempts = self.read_all()?;
        if attempts.len() <= keep_last {
            return Ok(0);
        }
        let removed = attempts.len() - keep_last;

        let mut body = String::new();
        for attempt in &attempts[removed..] {
            body.push_str(&serde_json::to_string(attempt)?);
            body.push('\n');
        }
        file.set_len(0).map_err(|e| self.io_error(e))?;
        file.seek(SeekFrom::Start(0)).map_err(|e| self.io_error(e))?;
        file.write_all(body.as_bytes()).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;

        debug!("Pruned {} history records", removed);
        Ok(removed)
    }
}

impl HistoryStore for JsonlHistoryStore {
    fn append(&self, attempt: &UpdateAttempt) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let line = serde_json::to_string(attempt)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        // Released when `file` is dropped
        file.lock_exclusive().map_err(|e| self.io_error(e))?;
        writeln!(file, "{}", line).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn query(&self, limit: usize) -> Result<Vec<UpdateAttempt>, HistoryError> {
        let mut attempts = self.read_all()?;
        attempts.reverse();
        attempts.truncate(limit);
        Ok(attempts)
    }
}

/// In-process history, for tests and embedders without a disk
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    attempts: Mutex<Vec<UpdateAttempt>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attempts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(&self, attempt: &UpdateAttempt) -> Result<(), HistoryError> {
        self.attempts
            .lock()
            .map_err(|_| HistoryError::Unavailable("history lock poisoned".to_string()))?
            .push(attempt.clone());
        Ok(())
    }

    fn query(&self, limit: usize) -> Result<Vec<UpdateAttempt>, HistoryError> {
        let attempts = self
            .attempts
            .lock()
            .map_err(|_| HistoryError::Unavailable("history lock poisoned".to_string()))?;
        Ok(attempts.iter().rev().take(limit).cloned().collect())
    }
}
