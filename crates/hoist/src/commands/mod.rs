//! CLI command implementations

pub mod apply;
pub mod check;
pub mod history;
pub mod init;
pub mod releases;
pub mod rollback;

use anyhow::{Context, Result};
use hoist_core::types::RuntimeConfig;
use hoist_core::HierarchicalConfigLoader;
use hoist_update::{EngineConfig, GitHubTransport, JsonlHistoryStore, UpdateEngine};
use std::sync::Arc;

use crate::cli::ConfigOverrides;

/// Load the runtime config and apply command-line overrides on top
pub fn load_config(overrides: &ConfigOverrides) -> Result<RuntimeConfig> {
    let loader = HierarchicalConfigLoader::new().context("Failed to locate config directory")?;
    let config = match &overrides.config {
        Some(path) => loader.load_runtime_config_from(path),
        None => loader.load_runtime_config(),
    }
    .context("Failed to load configuration")?;

    apply_overrides(config, overrides)
}

fn apply_overrides(mut config: RuntimeConfig, overrides: &ConfigOverrides) -> Result<RuntimeConfig> {
    if let Some(repo) = &overrides.repo {
        config.feed.repo = repo.clone();
    }
    if let Some(policy) = &overrides.policy {
        config.update.policy = policy
            .parse()
            .with_context(|| format!("Invalid --policy '{}'", policy))?;
    }
    if let Some(root) = &overrides.install_root {
        config.install.root = Some(root.clone().into_std_path_buf());
    }
    Ok(config)
}

/// Open the attempt history configured in `history.path`
pub fn open_history(config: &RuntimeConfig) -> Result<JsonlHistoryStore> {
    let path = config
        .history
        .path
        .clone()
        .context("history.path is not configured")?;
    Ok(JsonlHistoryStore::new(path))
}

/// Wire transport, history store and engine from the runtime config
pub fn build_engine(config: &RuntimeConfig, show_progress: bool) -> Result<UpdateEngine> {
    let mut engine_config =
        EngineConfig::from_runtime(config).context("Invalid update configuration")?;
    engine_config.show_progress = show_progress;

    let transport =
        GitHubTransport::from_config(config).context("Failed to create release transport")?;
    let history = open_history(config)?;

    Ok(UpdateEngine::new(
        engine_config,
        Arc::new(transport),
        Arc::new(history),
    ))
}
