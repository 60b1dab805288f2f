//! Configuration loading

mod loader;

pub use loader::{HierarchicalConfigLoader, CONFIG_FILE_NAME, HISTORY_FILE_NAME};
