//! Apply command

use anyhow::{anyhow, bail, Context, Result};
use dialoguer::Confirm;
use hoist_update::{AppliedResult, Release, UpdateEngine, UpdateError, UpdateOutcome};
use tracing::warn;

use crate::cli::{ApplyArgs, ConfigOverrides};
use crate::commands::{build_engine, load_config};
use crate::output;

pub async fn run(args: ApplyArgs, overrides: &ConfigOverrides, quiet: bool) -> Result<()> {
    let mut config = load_config(overrides)?;
    if args.no_backup {
        config.update.keep_backup = false;
    }
    let engine = build_engine(&config, !quiet)?;
    let current = engine
        .current_version()
        .context("Could not determine the installed version")?;

    // Ctrl-C stops the attempt at its next checkpoint; a running commit completes
    let cancel = engine.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling update");
            cancel.cancel();
        }
    });

    if let Some(tag) = &args.tag {
        let release = find_release(&engine, tag).await?;
        if !args.yes && !confirm(&format!("Install {} over {}?", release.tag(), current))? {
            output::info("Update cancelled");
            return Ok(());
        }
        let applied = engine.apply_update(&release).await.map_err(report)?;
        print_applied(&applied);
        return Ok(());
    }

    if args.yes {
        return match engine.update().await.map_err(report)? {
            UpdateOutcome::UpToDate { current } => {
                output::success(&format!("Already on the latest version ({})", current));
                Ok(())
            }
            UpdateOutcome::Applied(applied) => {
                print_applied(&applied);
                Ok(())
            }
        };
    }

    let spinner = output::spinner("Checking for updates...");
    let candidate = engine.check_for_update(&current).await;
    spinner.finish_and_clear();

    let Some(release) = candidate.context("Failed to check for updates")? else {
        output::success(&format!("Already on the latest version ({})", current));
        return Ok(());
    };

    output::info(&format!("Current version: {}", current));
    output::info(&format!("Available version: {}", release.tag()));
    if !release.body().trim().is_empty() {
        println!("\nChangelog:\n{}\n", output::preview(release.body(), 10));
    }
    if !confirm("Proceed with update?")? {
        output::info("Update cancelled");
        return Ok(());
    }

    let applied = engine.apply_update(&release).await.map_err(report)?;
    print_applied(&applied);
    Ok(())
}

async fn find_release(engine: &UpdateEngine, tag: &str) -> Result<Release> {
    let spinner = output::spinner("Fetching release information...");
    let catalog = engine.releases().await;
    spinner.finish_and_clear();

    let catalog = catalog.context("Failed to fetch releases")?;
    match catalog.find_by_tag(tag) {
        Some(release) => Ok(release.clone()),
        None => bail!("Release {} not found in {}", tag, engine.config().repo),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Print what an apply failure left behind before propagating it
fn report(err: UpdateError) -> anyhow::Error {
    match &err {
        UpdateError::CommitFailed { backup, .. } => {
            output::error(&err.to_string());
            if let Some(backup) = backup {
                output::kv("Backup", &backup.display().to_string());
            }
        }
        UpdateError::UpdateInProgress => {
            output::warning("Another update is already running for this installation");
        }
        e if e.is_verification_failure() => {
            output::error("The downloaded artifact failed verification and was discarded");
        }
        _ => {}
    }
    anyhow!(err).context("Update failed")
}

fn print_applied(applied: &AppliedResult) {
    output::success(&format!("Updated {} -> {}", applied.from, applied.to));
    output::kv("Asset", &applied.asset);
    output::kv("Strategy", &applied.strategy.to_string());
    output::kv("Location", &applied.location.display().to_string());

    let verification = &applied.verification;
    if verification.unverified {
        output::warning("Installed without checksum or signature verification");
    } else {
        if let Some(algorithm) = verification.checksum {
            output::kv("Checksum", &format!("{} verified", algorithm));
        }
        if let Some(signer) = &verification.signer {
            output::kv("Signed by", signer);
        }
    }

    if let Some(backup) = &applied.backup {
        output::kv("Backup", &backup.display().to_string());
        output::info("Run 'hoist confirm' to discard the backup or 'hoist rollback' to restore it");
    }
}
