//! mailbench - distributed mail-server benchmark orchestrator

use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod experiment;
mod mail;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Initialize tracing
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    cli::dispatch(cli).await
}
