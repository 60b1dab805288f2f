//! Hoist CLI - verified, rollback-safe self-update for GitHub-released applications
//!
//! This is the main entry point for the Hoist command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Check(args) => commands::check::run(args, &cli.overrides).await,
        Commands::Apply(args) => commands::apply::run(args, &cli.overrides, cli.quiet).await,
        Commands::Releases(args) => commands::releases::run(args, &cli.overrides).await,
        Commands::History(args) => commands::history::run(args, &cli.overrides),
        Commands::Rollback(args) => commands::rollback::run_rollback(args, &cli.overrides),
        Commands::Confirm => commands::rollback::run_confirm(&cli.overrides),
        Commands::Init(args) => commands::init::run(args, &cli.overrides),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
