//! In-memory [`PreferenceStore`] used by the engine's tests.
//!
//! Records are scoped by (project id, app id), object ids are allocated
//! sequentially, and reads honour `start` and the page size the same way the
//! web service does. Failures can be injected per project or per record name.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::error::StoreError;
use crate::model::{PreferenceRecord, RemoteId};
use crate::query::{CreateRequest, QueryBuilder, ReadQuery, UpdateRequest};
use crate::store::{
    CreateResult, NewPreference, OperationResult, PreferenceStore, PreferenceUpdate, QueryResult,
    RawPreference,
};

#[derive(Debug, Clone)]
struct StoredPreference {
    project_id: String,
    app_id: String,
    record: PreferenceRecord,
}

#[derive(Debug, Default)]
struct Failures {
    query_projects: HashSet<String>,
    rejected_names: HashSet<String>,
    rejected_ids: HashSet<RemoteId>,
}

pub struct MemoryStore {
    queries: QueryBuilder,
    records: Mutex<Vec<StoredPreference>>,
    failures: Mutex<Failures>,
    next_id: AtomicU64,
    query_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let queries = QueryBuilder::new("http://localhost/slm", "v2.0")
            .unwrap_or_else(|_| unreachable!("static base url is valid"));
        Self {
            queries,
            records: Mutex::new(Vec::new()),
            failures: Mutex::new(Failures::default()),
            next_id: AtomicU64::new(1000),
            query_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Descriptor builder to pair with this store.
    pub fn queries(&self) -> &QueryBuilder {
        &self.queries
    }

    /// Inserts a record directly and returns its id.
    pub fn seed(&self, project_id: &str, app_id: &str, name: &str, value: &str) -> RemoteId {
        let id = self.allocate_id();
        self.lock_records().push(StoredPreference {
            project_id: project_id.to_string(),
            app_id: app_id.to_string(),
            record: PreferenceRecord::new(name, value, id.clone()),
        });
        id
    }

    /// Makes every read of `project_id` fail at the transport level.
    pub fn fail_queries_for(&self, project_id: &str) {
        self.lock_failures().query_projects.insert(project_id.to_string());
    }

    /// Makes creates of `name` come back with an error list.
    pub fn reject_create_of(&self, name: &str) {
        self.lock_failures().rejected_names.insert(name.to_string());
    }

    /// Makes updates of `id` come back with an error list.
    pub fn reject_update_of(&self, id: &RemoteId) {
        self.lock_failures().rejected_ids.insert(id.clone());
    }

    /// Current records of a scope, in insertion order.
    pub fn records(&self, project_id: &str, app_id: &str) -> Vec<PreferenceRecord> {
        self.lock_records()
            .iter()
            .filter(|p| p.project_id == project_id && p.app_id == app_id)
            .map(|p| p.record.clone())
            .collect()
    }

    pub fn value_of(&self, project_id: &str, app_id: &str, name: &str) -> Option<String> {
        self.records(project_id, app_id)
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.value)
    }

    pub fn query_count(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> RemoteId {
        RemoteId::from(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<StoredPreference>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, Failures> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn query(&self, query: &ReadQuery) -> Result<QueryResult, StoreError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.lock_failures().query_projects.contains(&query.project_id) {
            return Err(StoreError::http(503, "Service Unavailable"));
        }

        let matching: Vec<RawPreference> = self
            .lock_records()
            .iter()
            .filter(|p| p.project_id == query.project_id && p.app_id == query.app_id)
            .map(|p| RawPreference {
                name: p.record.name.clone(),
                value: Some(p.record.value.clone()),
                object_id: p.record.remote_id.clone(),
            })
            .collect();

        let total = matching.len() as u64;
        let results = matching
            .into_iter()
            .skip(query.start.saturating_sub(1) as usize)
            .take(query.page_size as usize)
            .collect();

        Ok(QueryResult {
            total_result_count: total,
            start_index: Some(u64::from(query.start)),
            page_size: Some(u64::from(query.page_size)),
            results,
            ..QueryResult::default()
        })
    }

    async fn create(
        &self,
        request: &CreateRequest,
        preference: &NewPreference,
    ) -> Result<CreateResult, StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.lock_failures().rejected_names.contains(&preference.name) {
            return Ok(CreateResult {
                errors: vec![format!("Could not create Preference {}", preference.name)],
                ..CreateResult::default()
            });
        }

        let id = self.allocate_id();
        self.lock_records().push(StoredPreference {
            project_id: request.project_id.clone(),
            app_id: preference.app_id.clone(),
            record: PreferenceRecord::new(&preference.name, &preference.value, id.clone()),
        });
        Ok(CreateResult {
            object: Some(json!({
                "ObjectID": id.as_str(),
                "Name": preference.name,
                "Value": preference.value,
            })),
            ..CreateResult::default()
        })
    }

    async fn update(
        &self,
        request: &UpdateRequest,
        update: &PreferenceUpdate,
    ) -> Result<OperationResult, StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.lock_failures().rejected_ids.contains(&request.remote_id) {
            return Ok(OperationResult {
                errors: vec![format!("Could not update Preference {}", request.remote_id)],
                ..OperationResult::default()
            });
        }

        let mut records = self.lock_records();
        match records
            .iter_mut()
            .find(|p| p.record.remote_id == request.remote_id && p.project_id == request.project_id)
        {
            Some(stored) => {
                stored.record.value = update.value.clone();
                Ok(OperationResult::default())
            }
            None => Ok(OperationResult {
                errors: vec![format!("Cannot find object to update: {}", request.remote_id)],
                ..OperationResult::default()
            }),
        }
    }
}
