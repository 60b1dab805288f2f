//! # hoist-core
//!
//! Core library for Hoist providing:
//! - Semantic Versioning 2.0 parsing and precedence (`SemanticVersion`)
//! - Update policies deciding which candidate versions are acceptable
//! - Runtime configuration types and the hierarchical config loader
//! - Retry execution engine with policy-based configuration

pub mod config;
pub mod error;
pub mod policy;
pub mod retry;
pub mod types;
pub mod version;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use policy::UpdatePolicy;
pub use version::{ChangeLevel, SemanticVersion, VersionDelta};
