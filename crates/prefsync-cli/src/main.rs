mod cli;
mod commands;
mod config;
mod input;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};
use output::print_error;

/// Exit status when the run completed but some jobs or records failed.
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_PARTIAL_FAILURE),
        Err(e) => {
            print_error(&format!("{e:#}"));
            std::process::exit(1);
        }
    }
}

/// Returns whether every job and record succeeded.
async fn run() -> Result<bool> {
    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Config(args) => match args.command {
            ConfigCommands::Show => {
                commands::config::show(&cfg);
                Ok(true)
            }
        },
        Commands::Run(args) => {
            cfg.apply_overrides(args);
            cfg.validate()?;
            let summary = commands::run::run(&cfg).await?;
            Ok(summary.is_clean())
        }
    }
}
