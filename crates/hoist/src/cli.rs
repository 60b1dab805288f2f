//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Hoist - verified, rollback-safe self-update
#[derive(Parser, Debug)]
#[command(name = "hoist")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags that take precedence over config files and environment
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Path to hoist.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Repository publishing the releases (OWNER/NAME)
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// Update policy: stable, minor-only, patch-only, allow-prerelease
    #[arg(long, global = true)]
    pub policy: Option<String>,

    /// Installation root directory
    #[arg(long, global = true)]
    pub install_root: Option<Utf8PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether an update is available
    Check(CheckArgs),

    /// Download, verify and install the best available update
    Apply(ApplyArgs),

    /// List published releases with their policy verdicts
    Releases(ReleasesArgs),

    /// Show recorded update attempts
    History(HistoryArgs),

    /// Restore the version replaced by the last update
    Rollback(RollbackArgs),

    /// Keep the current version and discard its backup
    Confirm,

    /// Record the version of an existing installation
    Init(InitArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Install this release instead of the best candidate
    #[arg(long)]
    pub tag: Option<String>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Do not keep the replaced version for rollback
    #[arg(long)]
    pub no_backup: bool,
}

#[derive(Args, Debug)]
pub struct ReleasesArgs {
    /// Maximum number of releases to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Maximum number of attempts to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Version currently installed
    #[arg(long = "version", value_name = "VERSION")]
    pub installed_version: String,

    /// Overwrite an existing version marker
    #[arg(short, long)]
    pub force: bool,
}
