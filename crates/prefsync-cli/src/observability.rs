// Tracing setup: every event goes to the terminal and is appended to a log file.
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init_tracing(level: &str, log_file: &Path) -> Result<()> {
    // Prefer RUST_LOG from env, otherwise use provided level string.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .map_or_else(|| EnvFilter::try_new(level), Ok)
        .with_context(|| format!("Invalid log level: {level}"))?;

    let file = open_log_file(log_file)?;
    subscriber(filter, Mutex::new(file))
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

/// Opens `path` for appending, creating it on first use.
fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

/// Terminal layer plus a plain-text layer writing to `log_writer`.
fn subscriber<W>(filter: EnvFilter, log_writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(log_writer))
}
