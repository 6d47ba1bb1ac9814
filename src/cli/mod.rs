//! CLI argument parsing and command dispatch

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::BenchConfig;
use crate::experiment;

#[derive(Parser)]
#[command(name = "mailbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a benchmark experiment
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: String,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: String,
    },
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { config, json } => {
            let cfg = BenchConfig::load(Path::new(&config))?;
            let results = experiment::run(&cfg).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for (name, measurement) in &results {
                    println!("{name}: {measurement}");
                }
            }
            Ok(())
        }
        Commands::Validate { config } => {
            let cfg = BenchConfig::load(Path::new(&config))?;
            cfg.validate()?;
            println!("{config} is valid");
            Ok(())
        }
    }
}
