//! Bounded retry for fallible async operations
//!
//! Network operations in the update flow (listing releases, fetching
//! artifacts) are retried a bounded number of times according to a
//! [`RetryPolicy`](crate::types::RetryPolicy). A [`RetryPredicate`] decides
//! which errors are transient and a [`RetryObserver`] receives a callback for
//! every attempt.
//!
//! ```rust,no_run
//! use hoist_core::retry::{RetryExecutor, TracingObserver};
//! use hoist_core::types::RetryPolicy;
//!
//! async fn example() {
//!     let executor = RetryExecutor::<std::io::Error, _, _>::new(RetryPolicy::default())
//!         .with_observer(TracingObserver::new("download"));
//!
//!     let result = executor.execute(|| async { Ok::<_, std::io::Error>(42) }).await;
//!     assert_eq!(result.unwrap(), 42);
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::RetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, ClosurePredicate, RetryPredicate};
