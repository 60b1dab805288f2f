//! History command

use anyhow::{Context, Result};
use hoist_update::{HistoryStore, UpdateAttempt};
use tabled::{settings::Style, Table, Tabled};

use crate::cli::{ConfigOverrides, HistoryArgs};
use crate::commands::{load_config, open_history};
use crate::output;

#[derive(Tabled)]
struct AttemptRow {
    when: String,
    from: String,
    to: String,
    outcome: String,
    detail: String,
}

impl From<&UpdateAttempt> for AttemptRow {
    fn from(attempt: &UpdateAttempt) -> Self {
        let detail = match &attempt.failure {
            Some(failure) => match &failure.rollback {
                Some(rollback) => format!("{} at {} ({})", failure.kind, failure.stage, rollback),
                None => format!("{} at {}", failure.kind, failure.stage),
            },
            None => attempt.asset.clone().unwrap_or_default(),
        };
        Self {
            when: attempt.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            from: attempt.current_version.to_string(),
            to: attempt
                .candidate_version
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string()),
            outcome: attempt.outcome.to_string(),
            detail,
        }
    }
}

pub fn run(args: HistoryArgs, overrides: &ConfigOverrides) -> Result<()> {
    let config = load_config(overrides)?;
    let store = open_history(&config)?;
    let attempts = store
        .query(args.limit)
        .with_context(|| format!("Failed to read history from {}", store.path().display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&attempts)?);
        return Ok(());
    }

    if attempts.is_empty() {
        output::info("No update attempts recorded");
        return Ok(());
    }

    let rows: Vec<AttemptRow> = attempts.iter().map(AttemptRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
    Ok(())
}
