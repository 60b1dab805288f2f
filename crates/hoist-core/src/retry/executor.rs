//! Retry execution

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Instant;

use crate::types::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{calculate_delay, AlwaysRetry, RetryPredicate};

/// Retry executor with a policy, a predicate and an observer
pub struct RetryExecutor<E, P, O> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    _phantom: PhantomData<fn(&E)>,
}

impl<E> RetryExecutor<E, AlwaysRetry, NoOpObserver> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            predicate: AlwaysRetry,
            observer: NoOpObserver,
            _phantom: PhantomData,
        }
    }
}

impl<E, P, O> RetryExecutor<E, P, O> {
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutor<E, P2, O> {
        RetryExecutor {
            policy: self.policy,
            predicate,
            observer: self.observer,
            _phantom: PhantomData,
        }
    }

    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutor<E, P, O2> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            _phantom: PhantomData,
        }
    }
}

impl<E, P, O> RetryExecutor<E, P, O>
where
    E: Display + Send + 'static,
    P: RetryPredicate<E>,
    O: RetryObserver,
{
    /// Execute `op` until it succeeds, fails permanently, or runs out of attempts
    pub async fn execute<F, Fut, T>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.observer.on_attempt_start(attempt, max_attempts);

            let err = match op().await {
                Ok(result) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(result);
                }
                Err(err) => err,
            };

            if !self.predicate.should_retry(&err) {
                self.observer.on_non_retryable(attempt, &err);
                return Err(RetryError::NonRetryable {
                    attempt,
                    source: err,
                });
            }

            if attempt >= max_attempts {
                self.observer.on_exhausted(attempt, &err);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                    total_duration: start.elapsed(),
                });
            }

            let delay = calculate_delay(&self.policy, attempt);
            self.observer.on_attempt_failed(attempt, &err, delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ClosurePredicate;
    use crate::types::RetryStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            strategy: RetryStrategy::None,
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::<String, _, _>::new(quick(2));
        let result = executor.execute(|| async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("transient".to_string())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausts_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::<String, _, _>::new(quick(3));
        let result: Result<(), _> = executor
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::<String, _, _>::new(quick(5))
            .with_predicate(ClosurePredicate::new(|e: &String| e != "fatal"));

        let result: Result<(), _> = executor
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("fatal".to_string())
            })
            .await;

        assert!(matches!(result, Err(RetryError::NonRetryable { attempt: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::<String, _, _>::new(quick(0));
        let _ = executor
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("x".to_string())
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
