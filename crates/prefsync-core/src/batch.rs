//! Runs a batch of copy jobs, isolating each job's failures.
//!
//! Per job the engine moves through
//! `Start -> SourceLoaded -> TargetLoaded -> Reconciled -> Applying -> Done`.
//! A load or validation fault, or a panic anywhere in the job, ends the job in
//! `Failed`; the next job starts regardless. Jobs run strictly one after another, and within a job every
//! store call completes before the next one is issued.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::Instrument;

use crate::apply::{Outcome, apply};
use crate::error::SyncError;
use crate::loader::load_preference_set;
use crate::model::BatchJob;
use crate::query::QueryBuilder;
use crate::reconcile::reconcile;
use crate::store::PreferenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Start,
    SourceLoaded,
    TargetLoaded,
    Reconciled,
    Applying,
    Done,
    Failed,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Start => "start",
            JobPhase::SourceLoaded => "source loaded",
            JobPhase::TargetLoaded => "target loaded",
            JobPhase::Reconciled => "reconciled",
            JobPhase::Applying => "applying",
            JobPhase::Done => "done",
            JobPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum JobStatus {
    /// Every action was attempted. Individual outcomes may still be failures.
    Done { outcomes: Vec<Outcome> },
    /// The job stopped early; `phase` is the last phase it reached.
    Failed { phase: JobPhase, error: SyncError },
}

#[derive(Debug)]
pub struct JobReport {
    pub job: BatchJob,
    pub status: JobStatus,
}

impl JobReport {
    /// Terminal phase of the job.
    pub fn phase(&self) -> JobPhase {
        match self.status {
            JobStatus::Done { .. } => JobPhase::Done,
            JobStatus::Failed { .. } => JobPhase::Failed,
        }
    }

    pub fn outcomes(&self) -> &[Outcome] {
        match &self.status {
            JobStatus::Done { outcomes } => outcomes,
            JobStatus::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match &self.status {
            JobStatus::Failed { error, .. } => Some(error),
            JobStatus::Done { .. } => None,
        }
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            jobs: 1,
            ..BatchSummary::default()
        };
        if self.error().is_some() {
            summary.failed_jobs = 1;
        }
        for outcome in self.outcomes() {
            summary.record(outcome);
        }
        summary
    }
}

/// Counts of outcomes over one job or a whole batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub jobs: usize,
    pub failed_jobs: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed_records: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created { .. } => self.created += 1,
            Outcome::Updated { .. } => self.updated += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed_records += 1,
        }
    }

    fn merge(&mut self, other: BatchSummary) {
        self.jobs += other.jobs;
        self.failed_jobs += other.failed_jobs;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed_records += other.failed_records;
    }

    /// True when no job and no record failed.
    pub fn is_clean(&self) -> bool {
        self.failed_jobs == 0 && self.failed_records == 0
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        self.jobs.iter().fold(BatchSummary::default(), |mut acc, job| {
            acc.merge(job.summary());
            acc
        })
    }
}

/// Drives load, reconcile, and apply for each job against one store.
pub struct SyncEngine<'a, S: ?Sized> {
    store: &'a S,
    queries: &'a QueryBuilder,
}

impl<'a, S> SyncEngine<'a, S>
where
    S: PreferenceStore + ?Sized,
{
    pub fn new(store: &'a S, queries: &'a QueryBuilder) -> Self {
        Self { store, queries }
    }

    /// Runs all jobs in order and reports on each.
    pub async fn run_batch<I>(&self, jobs: I) -> BatchReport
    where
        I: IntoIterator<Item = BatchJob>,
    {
        let mut report = BatchReport::default();
        for (index, job) in jobs.into_iter().enumerate() {
            let span = tracing::info_span!("job", row = index + 1, app_id = %job.app_id);
            let job_report = self.run_job(job).instrument(span).await;
            report.jobs.push(job_report);
        }
        report
    }

    /// Runs one job. Never fails: faults are captured in the report.
    pub async fn run_job(&self, job: BatchJob) -> JobReport {
        tracing::info!(
            source = %job.source_project_id,
            target = %job.target_project_id,
            "Copying Kanban policies: {job}"
        );
        let mut phase = JobPhase::Start;
        let result = AssertUnwindSafe(self.execute(&job, &mut phase))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SyncError::fault(panic_message(&*panic))));
        let status = match result {
            Ok(outcomes) => {
                let failures = outcomes.iter().filter(|o| o.is_failure()).count();
                tracing::info!(actions = outcomes.len(), failures, "job finished");
                JobStatus::Done { outcomes }
            }
            Err(error) => {
                tracing::error!(%phase, category = %error.category(), "job failed: {error}");
                JobStatus::Failed { phase, error }
            }
        };
        JobReport { job, status }
    }

    async fn execute(&self, job: &BatchJob, phase: &mut JobPhase) -> Result<Vec<Outcome>, SyncError> {
        let source = load_preference_set(self.store, self.queries, &job.source_project_id, &job.app_id).await?;
        *phase = JobPhase::SourceLoaded;

        let target = load_preference_set(self.store, self.queries, &job.target_project_id, &job.app_id).await?;
        *phase = JobPhase::TargetLoaded;

        let actions = reconcile(&source, &target);
        *phase = JobPhase::Reconciled;
        tracing::debug!(actions = actions.len(), "reconciled");

        *phase = JobPhase::Applying;
        let mut outcomes = Vec::with_capacity(actions.len());
        for action in &actions {
            let outcome = apply(self.store, self.queries, &job.target_project_id, &job.app_id, action).await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Runs `jobs` sequentially against `store`.
pub async fn run_batch<S, I>(store: &S, queries: &QueryBuilder, jobs: I) -> BatchReport
where
    S: PreferenceStore + ?Sized,
    I: IntoIterator<Item = BatchJob>,
{
    SyncEngine::new(store, queries).run_batch(jobs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, StoreError};
    use crate::memory::MemoryStore;
    use crate::query::{CreateRequest, ReadQuery, UpdateRequest};
    use crate::store::{CreateResult, NewPreference, OperationResult, PreferenceUpdate, QueryResult};
    use async_trait::async_trait;

    /// Delegates to a [`MemoryStore`] but panics when reading `broken_project`.
    struct PanickingStore {
        inner: MemoryStore,
        broken_project: &'static str,
    }

    #[async_trait]
    impl PreferenceStore for PanickingStore {
        async fn query(&self, query: &ReadQuery) -> Result<QueryResult, StoreError> {
            if query.project_id == self.broken_project {
                panic!("store crashed reading {}", query.project_id);
            }
            self.inner.query(query).await
        }

        async fn create(
            &self,
            request: &CreateRequest,
            preference: &NewPreference,
        ) -> Result<CreateResult, StoreError> {
            self.inner.create(request, preference).await
        }

        async fn update(
            &self,
            request: &UpdateRequest,
            update: &PreferenceUpdate,
        ) -> Result<OperationResult, StoreError> {
            self.inner.update(request, update).await
        }
    }

    #[tokio::test]
    async fn test_creates_updates_and_skips() {
        let store = MemoryStore::new();
        store.seed("src", "7", "Entry Policy", "X");
        store.seed("src", "7", "Exit Policy", "Done");
        store.seed("src", "7", "Ready Policy", "Same");
        store.seed("src", "7", "columnWidths", "100");
        store.seed("dst", "7", "Exit Policy", "Old");
        store.seed("dst", "7", "Ready Policy", "Same");
        store.seed("dst", "7", "Legacy Policy", "Z");

        let report = run_batch(&store, store.queries(), [BatchJob::new("7", "src", "dst")]).await;
        let summary = report.summary();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.is_clean());
        assert_eq!(report.jobs[0].phase(), JobPhase::Done);
        assert_eq!(store.value_of("dst", "7", "Entry Policy").as_deref(), Some("X"));
        assert_eq!(store.value_of("dst", "7", "Exit Policy").as_deref(), Some("Done"));
        assert_eq!(store.value_of("dst", "7", "Legacy Policy").as_deref(), Some("Z"));
        assert_eq!(store.value_of("dst", "7", "columnWidths"), None);
    }

    #[tokio::test]
    async fn test_second_run_only_skips() {
        let store = MemoryStore::new();
        store.seed("src", "7", "Entry Policy", "X");
        store.seed("src", "7", "Exit Policy", "Y");
        store.seed("dst", "7", "Exit Policy", "old");

        run_batch(&store, store.queries(), [BatchJob::new("7", "src", "dst")]).await;
        let writes = store.write_count();

        let report = run_batch(&store, store.queries(), [BatchJob::new("7", "src", "dst")]).await;
        let summary = report.summary();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.created + summary.updated, 0);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_rejected_create_does_not_stop_job() {
        let store = MemoryStore::new();
        store.seed("src", "7", "A Policy", "1");
        store.seed("src", "7", "B Policy", "2");
        store.seed("src", "7", "C Policy", "3");
        store.reject_create_of("A Policy");

        let report = run_batch(&store, store.queries(), [BatchJob::new("7", "src", "dst")]).await;
        let summary = report.summary();

        assert_eq!(summary.failed_records, 1);
        assert_eq!(summary.created, 2);
        assert!(!summary.is_clean());
        assert_eq!(report.jobs[0].phase(), JobPhase::Done);
        assert_eq!(store.value_of("dst", "7", "C Policy").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_load_failure_isolated_to_job() {
        let store = MemoryStore::new();
        store.seed("src", "7", "Entry Policy", "X");
        store.fail_queries_for("broken");

        let jobs = [
            BatchJob::new("7", "src", "broken"),
            BatchJob::new("7", "", "dst"),
            BatchJob::new("7", "src", "dst"),
        ];
        let report = run_batch(&store, store.queries(), jobs).await;

        assert_eq!(report.jobs.len(), 3);
        match &report.jobs[0].status {
            JobStatus::Failed { phase, error } => {
                assert_eq!(*phase, JobPhase::SourceLoaded);
                assert_eq!(error.category(), ErrorCategory::Load);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        match &report.jobs[1].status {
            JobStatus::Failed { phase, error } => {
                assert_eq!(*phase, JobPhase::Start);
                assert_eq!(error.category(), ErrorCategory::Validation);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.jobs[2].phase(), JobPhase::Done);
        assert_eq!(store.value_of("dst", "7", "Entry Policy").as_deref(), Some("X"));

        let summary = report.summary();
        assert_eq!(summary.jobs, 3);
        assert_eq!(summary.failed_jobs, 2);
        assert_eq!(summary.created, 1);
    }

    #[tokio::test]
    async fn test_panic_in_job_does_not_stop_batch() {
        let store = PanickingStore {
            inner: MemoryStore::new(),
            broken_project: "boom",
        };
        store.inner.seed("src", "7", "Entry Policy", "X");

        let jobs = [BatchJob::new("7", "boom", "dst"), BatchJob::new("7", "src", "dst")];
        let report = run_batch(&store, store.inner.queries(), jobs).await;

        assert_eq!(report.jobs.len(), 2);
        match &report.jobs[0].status {
            JobStatus::Failed { phase, error } => {
                assert_eq!(*phase, JobPhase::Start);
                assert_eq!(error.category(), ErrorCategory::Fault);
                assert!(error.to_string().contains("store crashed reading boom"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.jobs[1].phase(), JobPhase::Done);
        assert_eq!(store.inner.value_of("dst", "7", "Entry Policy").as_deref(), Some("X"));
        assert_eq!(report.summary().failed_jobs, 1);
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "Unknown panic");
    }

    #[tokio::test]
    async fn test_apps_are_scoped_separately() {
        let store = MemoryStore::new();
        store.seed("src", "1", "Entry Policy", "app one");
        store.seed("src", "2", "Entry Policy", "app two");

        let report = run_batch(
            &store,
            store.queries(),
            [BatchJob::new("1", "src", "dst"), BatchJob::new("2", "src", "dst")],
        )
        .await;

        assert!(report.summary().is_clean());
        assert_eq!(store.value_of("dst", "1", "Entry Policy").as_deref(), Some("app one"));
        assert_eq!(store.value_of("dst", "2", "Entry Policy").as_deref(), Some("app two"));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(JobPhase::TargetLoaded.to_string(), "target loaded");
        assert_eq!(JobPhase::Failed.to_string(), "failed");
    }
}
