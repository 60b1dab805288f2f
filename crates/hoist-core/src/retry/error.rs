//! Error returned when a retried operation does not succeed

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Why a retried operation gave up
///
/// Generic over `E`, the error type of the operation being retried.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every permitted attempt failed with a retryable error
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        source: E,
        /// Time spent across all attempts and delays
        total_duration: Duration,
    },

    /// The predicate classified the error as permanent
    NonRetryable {
        /// Attempt on which the permanent error occurred
        attempt: u32,
        source: E,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => write!(
                f,
                "gave up after {} attempt(s) over {:.2}s: {}",
                attempts,
                total_duration.as_secs_f64(),
                source
            ),
            RetryError::NonRetryable { source, .. } => write!(f, "{}", source),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
                Some(source)
            }
        }
    }
}

impl<E> RetryError<E> {
    /// The error of the last attempt
    pub fn into_source(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_exhausted_display() {
        let err = RetryError::Exhausted {
            attempts: 2,
            source: io::Error::new(io::ErrorKind::TimedOut, "connection timeout"),
            total_duration: Duration::from_millis(1500),
        };

        let display = err.to_string();
        assert!(display.contains("2 attempt(s)"));
        assert!(display.contains("connection timeout"));
    }

    #[test]
    fn test_non_retryable_is_transparent() {
        let err = RetryError::NonRetryable {
            attempt: 1,
            source: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "not found");
        assert_eq!(err.into_source(), "not found");
    }
}
