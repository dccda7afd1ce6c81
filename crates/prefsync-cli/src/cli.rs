use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "prefsync")]
#[command(about = "Copy Kanban board policy preferences between Rally projects")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (defaults to ./prefsync.toml, then ~/.prefsync/config.toml)
    #[arg(short, long, global = true, env = "PREFSYNC_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy policies for every row of the input file
    Run(RunArgs),
    /// Inspect the resolved configuration
    Config(ConfigArgs),
}

#[derive(clap::Args, Default)]
pub struct RunArgs {
    /// Input file with one (app, source project, target project) row per line
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// Field delimiter of the input file
    #[arg(short, long)]
    pub delimiter: Option<char>,
    /// Character encoding of the input file (e.g. windows-1251, utf-8)
    #[arg(short, long)]
    pub encoding: Option<String>,
    /// Rally server base URL (e.g. https://rally1.rallydev.com/slm)
    #[arg(long)]
    pub base_url: Option<String>,
    /// Log file, appended to on every run
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Rally username for Basic Auth
    #[arg(short, long)]
    pub username: Option<String>,
    /// Rally password for Basic Auth
    #[arg(long)]
    pub password: Option<String>,
    /// Rally API key (used instead of username/password)
    #[arg(long)]
    pub api_key: Option<String>,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current config (secrets are masked)
    Show,
}
