//! Error types for hoist-core

use thiserror::Error;

/// Result type alias using hoist-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Hoist
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format or value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Text that is not a Semantic Versioning 2.0 version
    #[error("Malformed version '{input}': {reason}")]
    MalformedVersion { input: String, reason: String },

    /// Unknown update policy name
    #[error("Unknown update policy: {policy}. Valid policies: stable, minor-only, patch-only, allow-prerelease")]
    InvalidPolicy { policy: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed version error
    pub fn malformed_version(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedVersion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid policy error
    pub fn invalid_policy(policy: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            policy: policy.into(),
        }
    }
}
