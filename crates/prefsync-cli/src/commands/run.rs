use anyhow::{Context, Result};
use prefsync_core::{BatchSummary, RallyClient, run_batch};

use crate::config::AppConfig;
use crate::input;
use crate::observability;
use crate::output::print_report;

/// Copies policies for every input row and prints the run report.
pub async fn run(cfg: &AppConfig) -> Result<BatchSummary> {
    observability::init_tracing(&cfg.log_level, &cfg.log_file)?;

    let rally = cfg.rally_config()?;
    tracing::info!(
        "Connecting to {} as {}",
        rally.base_url,
        rally.credentials.describe()
    );
    let client = RallyClient::connect(&rally)
        .await
        .context("Failed to connect to Rally")?;

    tracing::info!("Reading Kanban settings from input file: {}", cfg.input.display());
    let jobs = input::read_jobs_from_path(&cfg.input, cfg.delimiter_byte()?, cfg.input_encoding()?)?;
    tracing::info!(rows = jobs.len(), "input loaded");

    let report = run_batch(&client, client.queries(), jobs).await;
    print_report(&report);
    Ok(report.summary())
}
