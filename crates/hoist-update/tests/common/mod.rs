//! Common test infrastructure for hoist-update tests
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `constants`: Versions, tags, repository and payload data
//! - `builders`: Fluent builders for feed records and artifacts
//! - `mock_transport`: In-memory `ReleaseTransport`
//! - `engine_helpers`: Engine and installation setup

// Not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod constants;
pub mod engine_helpers;
pub mod mock_transport;

pub use builders::*;
pub use constants::*;
pub use engine_helpers::*;
pub use mock_transport::*;
