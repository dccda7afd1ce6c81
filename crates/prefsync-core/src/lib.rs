//! Reconciliation engine for copying Kanban policy preferences between Rally
//! projects.
//!
//! For each [`BatchJob`] the engine loads the policy preferences of the source
//! and target scopes, computes a list of [`ReconcileAction`]s, and applies
//! them one at a time. Failures stop at most the current job or action.
//!
//! # Example
//!
//! ```ignore
//! use prefsync_core::{BatchJob, Credentials, RallyClient, RallyConfig, run_batch};
//!
//! let config = RallyConfig::new(Credentials::ApiKey { key: "_abc".into() });
//! let client = RallyClient::connect(&config).await?;
//! let jobs = vec![BatchJob::new("9552890650", "4625248927", "4625249001")];
//! let report = run_batch(&client, client.queries(), jobs).await;
//! println!("{:?}", report.summary());
//! ```

pub mod apply;
pub mod batch;
pub mod client;
pub mod error;
pub mod loader;
pub mod memory;
pub mod model;
pub mod query;
pub mod reconcile;
pub mod store;

pub use apply::{Outcome, apply};
pub use batch::{BatchReport, BatchSummary, JobPhase, JobReport, JobStatus, SyncEngine, run_batch};
pub use client::{Credentials, IntegrationHeaders, RallyClient, RallyConfig};
pub use error::{ErrorCategory, StoreError, SyncError};
pub use loader::load_preference_set;
pub use model::{BatchJob, POLICY_MARKER, PreferenceRecord, PreferenceSet, RemoteId};
pub use query::{CreateRequest, PAGE_SIZE, QueryBuilder, ReadQuery, UpdateRequest};
pub use reconcile::{ReconcileAction, reconcile};
pub use store::PreferenceStore;
