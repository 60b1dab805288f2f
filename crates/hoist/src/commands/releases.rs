//! Releases command

use anyhow::{Context, Result};
use hoist_core::{SemanticVersion, UpdatePolicy};
use hoist_update::{Release, ReleaseCatalog, ReleaseVerdict};
use tabled::{settings::Style, Table, Tabled};

use crate::cli::{ConfigOverrides, ReleasesArgs};
use crate::commands::{build_engine, load_config};
use crate::output;

#[derive(Tabled)]
struct ReleaseRow {
    tag: String,
    published: String,
    #[tabled(rename = "pre-release")]
    prerelease: String,
    assets: usize,
    verdict: String,
}

pub async fn run(args: ReleasesArgs, overrides: &ConfigOverrides) -> Result<()> {
    let config = load_config(overrides)?;
    let engine = build_engine(&config, false)?;
    // Listing works without a known installed version; verdicts then show as "-"
    let current = engine.current_version().ok();

    let spinner = output::spinner("Fetching releases...");
    let catalog = engine.releases().await;
    spinner.finish_and_clear();
    let catalog = catalog.context("Failed to fetch releases")?;

    if catalog.is_empty() {
        output::warning(&format!("No releases published for {}", engine.config().repo));
        return Ok(());
    }

    output::header(&format!("Releases of {}", engine.config().repo));
    let policy = engine.config().policy;
    let rows: Vec<ReleaseRow> = catalog
        .releases()
        .iter()
        .take(args.limit)
        .map(|release| row(release, current.as_ref(), policy))
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);

    if let Some(current) = current {
        output::kv("Installed", &current.to_string());
    }
    output::kv("Policy", policy.as_str());
    Ok(())
}

fn row(release: &Release, current: Option<&SemanticVersion>, policy: UpdatePolicy) -> ReleaseRow {
    ReleaseRow {
        tag: release.tag().to_string(),
        published: release
            .published_at()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string()),
        prerelease: if release.is_prerelease() { "yes" } else { "" }.to_string(),
        assets: release.assets().len(),
        verdict: verdict_label(release, current, policy).to_string(),
    }
}

fn verdict_label(
    release: &Release,
    current: Option<&SemanticVersion>,
    policy: UpdatePolicy,
) -> &'static str {
    let Some(current) = current else {
        return "-";
    };
    if release.version() == Some(current) {
        return "installed";
    }
    match ReleaseCatalog::verdict(release, current, policy) {
        ReleaseVerdict::Candidate => "candidate",
        ReleaseVerdict::NotNewer => "older",
        ReleaseVerdict::OutsidePolicy => "outside policy",
        ReleaseVerdict::UnparseableTag => "not a version",
    }
}
