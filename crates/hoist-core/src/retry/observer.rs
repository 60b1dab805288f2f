//! Retry observation and logging

use std::fmt::Display;
use std::time::Duration;

/// Receives callbacks while an operation is being retried
pub trait RetryObserver: Send + Sync {
    /// An attempt is about to start (1-indexed)
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32);

    /// An attempt failed and another one follows after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration);

    /// The operation succeeded
    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// The final permitted attempt failed
    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display);

    /// The predicate refused to retry the error
    fn on_non_retryable(&self, attempt: u32, error: &dyn Display) {
        let _ = (attempt, error);
    }
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Display) {}
}

/// Observer that logs through `tracing`
///
/// Attempt starts log at DEBUG, retried failures at WARN, exhaustion at
/// ERROR. A success logs at INFO only when it needed a retry.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            operation = %self.operation,
            attempt,
            max_attempts,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display) {
        tracing::error!(
            operation = %self.operation,
            attempts,
            error = %final_error,
            "all retry attempts exhausted"
        );
    }

    fn on_non_retryable(&self, attempt: u32, error: &dyn Display) {
        tracing::debug!(
            operation = %self.operation,
            attempt,
            error = %error,
            "error is not retryable"
        );
    }
}
