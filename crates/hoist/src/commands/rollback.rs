//! Rollback and confirm commands

use anyhow::{Context, Result};
use dialoguer::Confirm;

use crate::cli::{ConfigOverrides, RollbackArgs};
use crate::commands::{build_engine, load_config};
use crate::output;

pub fn run_rollback(args: RollbackArgs, overrides: &ConfigOverrides) -> Result<()> {
    let config = load_config(overrides)?;
    let engine = build_engine(&config, false)?;

    let state = engine
        .installed_state()
        .context("Failed to read installation state")?;
    let Some(slot) = state.as_ref().and_then(|s| s.backup.as_ref()) else {
        output::warning("No backup is available to roll back to");
        return Ok(());
    };

    if !args.yes {
        let current = state
            .as_ref()
            .map(|s| s.version.to_string())
            .unwrap_or_default();
        let proceed = Confirm::new()
            .with_prompt(format!("Restore {} over {}?", slot.version, current))
            .default(false)
            .interact()?;
        if !proceed {
            output::info("Rollback cancelled");
            return Ok(());
        }
    }

    let restored = engine.rollback().context("Rollback failed")?;
    output::success(&format!("Restored version {}", restored));
    Ok(())
}

pub fn run_confirm(overrides: &ConfigOverrides) -> Result<()> {
    let config = load_config(overrides)?;
    let engine = build_engine(&config, false)?;

    match engine.confirm().context("Failed to confirm update")? {
        Some(backup) => output::success(&format!("Removed backup {}", backup.display())),
        None => output::info("No backup to remove"),
    }
    Ok(())
}
