//! Configuration and shared value types

mod runtime_config;

pub use runtime_config::{
    CommitStrategyPreference, FeedConfig, HistoryConfig, InstallConfig, NetworkConfig,
    RetryPoliciesConfig, RetryPolicy, RetryStrategy, RuntimeConfig, UpdateConfig,
};
