//! Check command

use anyhow::{Context, Result};
use serde_json::json;

use crate::cli::{CheckArgs, ConfigOverrides};
use crate::commands::{build_engine, load_config};
use crate::output;

pub async fn run(args: CheckArgs, overrides: &ConfigOverrides) -> Result<()> {
    let config = load_config(overrides)?;
    let engine = build_engine(&config, false)?;
    let current = engine
        .current_version()
        .context("Could not determine the installed version")?;

    let spinner = (!args.json).then(|| output::spinner("Checking for updates..."));
    let candidate = engine.check_for_update(&current).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let candidate = candidate.context("Failed to check for updates")?;

    if args.json {
        let report = json!({
            "current": current.to_string(),
            "policy": config.update.policy.as_str(),
            "candidate": candidate.as_ref().map(|r| r.tag()),
            "delta": candidate
                .as_ref()
                .and_then(|r| r.version())
                .map(|latest| current.delta_to(latest).to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    output::info(&format!("Current version: {}", current));
    match candidate {
        Some(release) => {
            output::success(&format!("Update available: {}", release.tag()));
            if let Some(latest) = release.version() {
                output::kv("Status", &current.delta_to(latest).to_string());
            }
            if let Some(published) = release.published_at() {
                output::kv("Published", &published.format("%Y-%m-%d").to_string());
            }
            if !release.body().trim().is_empty() {
                println!("\nChangelog:\n{}\n", output::preview(release.body(), 10));
            }
            output::info("Run 'hoist apply' to install the update");
        }
        None => {
            output::success(&format!(
                "Already on the latest version allowed by the {} policy",
                config.update.policy
            ));
        }
    }

    Ok(())
}
