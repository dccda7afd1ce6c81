use colored::Colorize;
use prefsync_core::{BatchReport, BatchSummary, JobReport, JobStatus};
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_report(report: &BatchReport) {
    if report.jobs.is_empty() {
        println!("No rows found in input.");
        return;
    }
    println!("{}", report_table(report));

    let summary = report.summary();
    let totals = totals_line(&summary);
    if summary.is_clean() {
        print_success(&totals);
    } else {
        print_error(&totals);
        for (row, job) in report.jobs.iter().enumerate() {
            for outcome in job.outcomes() {
                if let Some(err) = outcome.to_error() {
                    eprintln!("  row {}: {}", row + 1, err);
                }
            }
        }
    }
}

fn report_table(report: &BatchReport) -> String {
    let mut builder = Builder::default();
    builder.push_record([
        "Row", "App", "Source", "Target", "Status", "Created", "Updated", "Skipped", "Failed",
    ]);
    for (row, job) in report.jobs.iter().enumerate() {
        let counts = job.summary();
        builder.push_record([
            (row + 1).to_string(),
            job.job.app_id.clone(),
            project_label(&job.job.source_project_name, &job.job.source_project_id),
            project_label(&job.job.target_project_name, &job.job.target_project_id),
            status_label(job),
            counts.created.to_string(),
            counts.updated.to_string(),
            counts.skipped.to_string(),
            counts.failed_records.to_string(),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}

fn project_label(name: &str, id: &str) -> String {
    match (name.is_empty(), id.is_empty()) {
        (_, true) => "-".to_string(),
        (true, false) => id.to_string(),
        (false, false) => format!("{name} ({id})"),
    }
}

fn status_label(job: &JobReport) -> String {
    match &job.status {
        JobStatus::Done { .. } => "done".to_string(),
        JobStatus::Failed { phase, error } => format!("failed at {phase}: {error}"),
    }
}

fn totals_line(summary: &BatchSummary) -> String {
    format!(
        "{} jobs ({} failed): {} created, {} updated, {} unchanged, {} failed",
        summary.jobs,
        summary.failed_jobs,
        summary.created,
        summary.updated,
        summary.skipped,
        summary.failed_records
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefsync_core::{BatchJob, JobPhase, Outcome, StoreError, SyncError};

    fn report() -> BatchReport {
        BatchReport {
            jobs: vec![
                JobReport {
                    job: BatchJob::new("7", "10", "20").with_names("Alpha", "Beta"),
                    status: JobStatus::Done {
                        outcomes: vec![
                            Outcome::Created {
                                name: "Entry Policy".into(),
                                value: "X".into(),
                            },
                            Outcome::Skipped {
                                name: "Exit Policy".into(),
                            },
                        ],
                    },
                },
                JobReport {
                    job: BatchJob::new("7", "10", "30"),
                    status: JobStatus::Failed {
                        phase: JobPhase::SourceLoaded,
                        error: SyncError::load("30", "7", StoreError::http(503, "down")),
                    },
                },
            ],
        }
    }

    #[test]
    fn test_table_lists_every_job() {
        let table = report_table(&report());
        assert!(table.contains("Alpha (10)"));
        assert!(table.contains("Beta (20)"));
        assert!(table.contains("failed at source loaded"));
        assert!(table.contains("HTTP 503"));
    }

    #[test]
    fn test_project_label() {
        assert_eq!(project_label("", ""), "-");
        assert_eq!(project_label("", "10"), "10");
        assert_eq!(project_label("Alpha", "10"), "Alpha (10)");
    }

    #[test]
    fn test_totals_line() {
        let summary = report().summary();
        assert_eq!(
            totals_line(&summary),
            "2 jobs (1 failed): 1 created, 0 updated, 1 unchanged, 0 failed"
        );
    }
}
