//! Diff of a source preference set against a target set.
//!
//! The sync is one-directional and additive: every source name yields exactly
//! one action, and names that exist only in the target are never visited.

use std::fmt;

use crate::model::{PreferenceSet, RemoteId};

/// What has to happen to bring one target preference in line with the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// The target scope has no preference with this name.
    Create { name: String, value: String },
    /// The target preference `remote_id` holds a different value.
    Update {
        name: String,
        remote_id: RemoteId,
        value: String,
    },
    /// The target already holds the source value.
    NoOp { name: String },
}

impl ReconcileAction {
    pub fn name(&self) -> &str {
        match self {
            Self::Create { name, .. } | Self::Update { name, .. } | Self::NoOp { name } => name,
        }
    }

    /// Whether applying this action calls the store.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::NoOp { .. })
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { name, .. } => write!(f, "create {name}"),
            Self::Update { name, remote_id, .. } => write!(f, "update {name} ({remote_id})"),
            Self::NoOp { name } => write!(f, "keep {name}"),
        }
    }
}

/// Computes the actions that copy `source` onto `target`.
///
/// Values are compared with exact string equality. An `Update` always carries
/// the target record's id.
pub fn reconcile(source: &PreferenceSet, target: &PreferenceSet) -> Vec<ReconcileAction> {
    source
        .iter()
        .map(|(name, src)| match target.get(name) {
            None => ReconcileAction::Create {
                name: name.to_string(),
                value: src.value.clone(),
            },
            Some(dst) if dst.value != src.value => ReconcileAction::Update {
                name: name.to_string(),
                remote_id: dst.remote_id.clone(),
                value: src.value.clone(),
            },
            Some(_) => ReconcileAction::NoOp {
                name: name.to_string(),
            },
        })
        .collect()
}
