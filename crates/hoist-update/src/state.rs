//! Per-attempt update state machine

use crate::history::AttemptOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::debug;

/// Where an update attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    Idle,
    Checking,
    CandidateFound,
    UpToDate,
    CheckFailed,
    Downloading,
    Downloaded,
    DownloadFailed,
    Verifying,
    Verified,
    VerificationFailed,
    Staging,
    Staged,
    Committing,
    Applied,
    CommitFailed,
    Cancelled,
}

impl UpdateState {
    /// Whether the machine may move from `self` to `next`
    pub fn can_transition_to(self, next: UpdateState) -> bool {
        use UpdateState::*;

        if self.is_terminal() {
            return next == Idle;
        }
        if self != Idle && next == self.failure_state() {
            return true;
        }
        match (self, next) {
            (Idle, Checking) => true,
            // An explicitly chosen release skips the check
            (Idle, CandidateFound) => true,
            (Checking, CandidateFound | UpToDate) => true,
            (CandidateFound, Downloading) => true,
            (Downloading, Downloaded) => true,
            (Downloaded, Verifying) => true,
            (Verifying, Verified) => true,
            (Verified, Staging) => true,
            (Staging, Staged) => true,
            (Staged, Committing) => true,
            (Committing, Applied) => true,
            // Cancellation is honoured up to and including Staged
            (
                Checking | CandidateFound | Downloading | Downloaded | Verifying | Verified
                | Staging | Staged,
                Cancelled,
            ) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.outcome().is_some()
    }

    /// The history outcome a terminal state is recorded as
    pub fn outcome(self) -> Option<AttemptOutcome> {
        match self {
            UpdateState::UpToDate => Some(AttemptOutcome::UpToDate),
            UpdateState::CheckFailed => Some(AttemptOutcome::CheckFailed),
            UpdateState::DownloadFailed => Some(AttemptOutcome::DownloadFailed),
            UpdateState::VerificationFailed => Some(AttemptOutcome::VerificationFailed),
            UpdateState::Applied => Some(AttemptOutcome::Applied),
            UpdateState::CommitFailed => Some(AttemptOutcome::CommitFailed),
            UpdateState::Cancelled => Some(AttemptOutcome::Cancelled),
            _ => None,
        }
    }

    /// The failure state for an error raised while in `self`
    ///
    /// Failures before the download starts (no usable asset, unparseable
    /// tag) count as download failures.
    pub fn failure_state(self) -> UpdateState {
        match self {
            UpdateState::Checking => UpdateState::CheckFailed,
            UpdateState::Idle | UpdateState::CandidateFound | UpdateState::Downloading => {
                UpdateState::DownloadFailed
            }
            UpdateState::Downloaded | UpdateState::Verifying => UpdateState::VerificationFailed,
            _ => UpdateState::CommitFailed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateState::Idle => "idle",
            UpdateState::Checking => "checking",
            UpdateState::CandidateFound => "candidate_found",
            UpdateState::UpToDate => "up_to_date",
            UpdateState::CheckFailed => "check_failed",
            UpdateState::Downloading => "downloading",
            UpdateState::Downloaded => "downloaded",
            UpdateState::DownloadFailed => "download_failed",
            UpdateState::Verifying => "verifying",
            UpdateState::Verified => "verified",
            UpdateState::VerificationFailed => "verification_failed",
            UpdateState::Staging => "staging",
            UpdateState::Staged => "staged",
            UpdateState::Committing => "committing",
            UpdateState::Applied => "applied",
            UpdateState::CommitFailed => "commit_failed",
            UpdateState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes the engine's state to subscribers
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<UpdateState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(UpdateState::Idle);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> UpdateState {
        *self.tx.borrow()
    }

    /// Force the machine back to `Idle` at the start of a new attempt
    pub(crate) fn reset(&self) {
        self.tx.send_replace(UpdateState::Idle);
    }

    /// Move to `next`; illegal transitions are logged and ignored
    pub fn advance(&self, next: UpdateState) -> bool {
        let current = self.current();
        if !current.can_transition_to(next) {
            debug!("Ignoring illegal transition {} -> {}", current, next);
            return false;
        }
        debug!("State {} -> {}", current, next);
        self.tx.send_replace(next);
        true
    }
}
