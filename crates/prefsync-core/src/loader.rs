//! Fetches the policy preferences of one scope, following pagination.

use crate::error::{StoreError, SyncError};
use crate::model::{PreferenceRecord, PreferenceSet};
use crate::query::QueryBuilder;
use crate::store::PreferenceStore;

/// Loads every policy preference of `app_id` in `project_id`.
///
/// Pages are requested until the reported total has been read or the store
/// returns an empty page.
///
/// # Errors
///
/// Returns `SyncError::Validation` for blank identifiers and `SyncError::Load`
/// when the store cannot be read or reports an error list.
pub async fn load_preference_set<S>(
    store: &S,
    queries: &QueryBuilder,
    project_id: &str,
    app_id: &str,
) -> Result<PreferenceSet, SyncError>
where
    S: PreferenceStore + ?Sized,
{
    let mut set = PreferenceSet::new();
    let mut start: u32 = 1;
    let mut read: u64 = 0;

    loop {
        let query = queries.build_read_page(project_id, app_id, start)?;
        let page = store
            .query(&query)
            .await
            .map_err(|e| SyncError::load(project_id, app_id, e))?;

        if !page.errors.is_empty() {
            return Err(SyncError::load(
                project_id,
                app_id,
                StoreError::Rejected {
                    errors: page.errors,
                },
            ));
        }
        for warning in &page.warnings {
            tracing::warn!(project_id, app_id, "{warning}");
        }

        let total = page.total_result_count;
        if start == 1 {
            tracing::info!(
                project_id,
                app_id,
                total,
                "Found {total} Preferences for App ObjectID: {app_id}."
            );
        }

        let count = page.results.len();
        for raw in page.results {
            let record = PreferenceRecord::from(raw);
            if record.is_policy() {
                tracing::info!(
                    project_id,
                    name = %record.name,
                    value = %record.value,
                    remote_id = %record.remote_id,
                    "Read Policy for Column: {}",
                    record.name
                );
                set.insert(record);
            }
        }

        read += count as u64;
        if count == 0 || read >= total {
            break;
        }
        start = start.saturating_add(count as u32);
    }

    tracing::debug!(project_id, app_id, policies = set.len(), "preference set loaded");
    Ok(set)
}
