//! Executes reconcile actions against the store.
//!
//! A failing action yields [`Outcome::Failed`] instead of an error so the
//! caller can move on to the next action.

use crate::error::{StoreError, SyncError};
use crate::model::RemoteId;
use crate::query::{QueryBuilder, project_ref};
use crate::reconcile::ReconcileAction;
use crate::store::{NewPreference, PreferenceStore, PreferenceUpdate, WriteResponse};

/// Result of applying one [`ReconcileAction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created {
        name: String,
        value: String,
    },
    Updated {
        name: String,
        value: String,
    },
    /// Values already matched; no call was made.
    Skipped {
        name: String,
    },
    Failed {
        name: String,
        remote_id: Option<RemoteId>,
        errors: Vec<String>,
    },
}

impl Outcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Created { name, .. }
            | Self::Updated { name, .. }
            | Self::Skipped { name }
            | Self::Failed { name, .. } => name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The failure as an apply error, if this outcome is one.
    pub fn to_error(&self) -> Option<SyncError> {
        match self {
            Self::Failed { name, errors, .. } => Some(SyncError::apply(name.clone(), errors.clone())),
            _ => None,
        }
    }
}

/// Applies `action` to the scope (`project_id`, `app_id`).
pub async fn apply<S>(
    store: &S,
    queries: &QueryBuilder,
    project_id: &str,
    app_id: &str,
    action: &ReconcileAction,
) -> Outcome
where
    S: PreferenceStore + ?Sized,
{
    match action {
        ReconcileAction::Create { name, value } => {
            let request = match queries.build_create_request(project_id) {
                Ok(request) => request,
                Err(e) => return failed(project_id, name, None, vec![e.to_string()]),
            };
            let preference = NewPreference {
                name: name.clone(),
                value: value.clone(),
                project: project_ref(&request.project_id),
                app_id: app_id.to_string(),
            };
            match check(store.create(&request, &preference).await) {
                Ok(()) => {
                    tracing::info!(project_id, name = %name, value = %value, "Target Kanban policy {name} created: {value}");
                    Outcome::Created {
                        name: name.clone(),
                        value: value.clone(),
                    }
                }
                Err(errors) => failed(project_id, name, None, errors),
            }
        }
        ReconcileAction::Update {
            name,
            remote_id,
            value,
        } => {
            let request = match queries.build_update_request(project_id, remote_id) {
                Ok(request) => request,
                Err(e) => return failed(project_id, name, Some(remote_id), vec![e.to_string()]),
            };
            let update = PreferenceUpdate {
                value: value.clone(),
            };
            match check(store.update(&request, &update).await) {
                Ok(()) => {
                    tracing::info!(
                        project_id,
                        name = %name,
                        remote_id = %remote_id,
                        value = %value,
                        "Target Kanban policy {name} updated: {value}"
                    );
                    Outcome::Updated {
                        name: name.clone(),
                        value: value.clone(),
                    }
                }
                Err(errors) => failed(project_id, name, Some(remote_id), errors),
            }
        }
        ReconcileAction::NoOp { name } => {
            tracing::info!(
                project_id,
                name = %name,
                "Source/Target Policies are already the same. No copy/update is needed."
            );
            Outcome::Skipped { name: name.clone() }
        }
    }
}

/// Folds a transport failure and a store-reported error list into one shape.
fn check<R: WriteResponse>(result: Result<R, StoreError>) -> Result<(), Vec<String>> {
    match result {
        Ok(response) if response.is_success() => Ok(()),
        Ok(response) => Err(response.errors().to_vec()),
        Err(e) => Err(vec![e.to_string()]),
    }
}

fn failed(project_id: &str, name: &str, remote_id: Option<&RemoteId>, errors: Vec<String>) -> Outcome {
    match remote_id {
        Some(id) => tracing::error!(project_id, name, remote_id = %id, ?errors, "failed to update policy"),
        None => tracing::error!(project_id, name, ?errors, "failed to create policy"),
    }
    Outcome::Failed {
        name: name.to_string(),
        remote_id: remote_id.cloned(),
        errors,
    }
}
