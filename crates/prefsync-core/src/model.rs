//! Preference records, the filtered sets built from them, and batch jobs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Substring a preference name must contain to take part in a sync.
pub const POLICY_MARKER: &str = "Policy";

/// Identifier assigned by the remote store when a record is created.
///
/// The store sends it as a JSON number, but it is only ever echoed back in a
/// URL, so it is kept as opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawObjectId", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

impl From<u64> for RemoteId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawObjectId {
    Number(u64),
    Text(String),
}

impl From<RawObjectId> for RemoteId {
    fn from(raw: RawObjectId) -> Self {
        match raw {
            RawObjectId::Number(n) => n.into(),
            RawObjectId::Text(s) => Self(s),
        }
    }
}

/// One named preference value within a (project, app) scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceRecord {
    pub name: String,
    pub value: String,
    pub remote_id: RemoteId,
}

impl PreferenceRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>, remote_id: impl Into<RemoteId>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            remote_id: remote_id.into(),
        }
    }

    /// Whether this record is a Kanban column policy.
    pub fn is_policy(&self) -> bool {
        self.name.contains(POLICY_MARKER)
    }
}

/// Policy preferences of one scope, keyed by exact name.
///
/// Only records passing [`PreferenceRecord::is_policy`] are ever admitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceSet {
    records: BTreeMap<String, PreferenceRecord>,
}

impl PreferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from raw records, dropping everything that is not a policy.
    /// A later record with a repeated name replaces the earlier one.
    pub fn from_records(records: impl IntoIterator<Item = PreferenceRecord>) -> Self {
        let mut set = Self::new();
        set.extend(records);
        set
    }

    /// Adds a record if it is a policy. Returns whether it was retained.
    pub fn insert(&mut self, record: PreferenceRecord) -> bool {
        if !record.is_policy() {
            return false;
        }
        self.records.insert(record.name.clone(), record);
        true
    }

    pub fn get(&self, name: &str) -> Option<&PreferenceRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PreferenceRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Extend<PreferenceRecord> for PreferenceSet {
    fn extend<T: IntoIterator<Item = PreferenceRecord>>(&mut self, iter: T) {
        for record in iter {
            self.insert(record);
        }
    }
}

/// One row of batch input: copy policies for `app_id` from source to target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchJob {
    pub app_id: String,
    pub source_project_name: String,
    pub source_project_id: String,
    pub target_project_name: String,
    pub target_project_id: String,
}

impl BatchJob {
    pub fn new(
        app_id: impl Into<String>,
        source_project_id: impl Into<String>,
        target_project_id: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            source_project_id: source_project_id.into(),
            target_project_id: target_project_id.into(),
            ..Self::default()
        }
    }

    pub fn with_names(
        mut self,
        source_project_name: impl Into<String>,
        target_project_name: impl Into<String>,
    ) -> Self {
        self.source_project_name = source_project_name.into();
        self.target_project_name = target_project_name.into();
        self
    }
}

impl fmt::Display for BatchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "app {}: {} ({}) -> {} ({})",
            self.app_id,
            self.source_project_name,
            self.source_project_id,
            self.target_project_name,
            self.target_project_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keeps_only_policies() {
        let set = PreferenceSet::from_records([
            PreferenceRecord::new("ScheduleState Defined Policy", "WIP 3", 1u64),
            PreferenceRecord::new("columnWidths", "120,120", 2u64),
            PreferenceRecord::new("Exit Policy", "Reviewed", 3u64),
            PreferenceRecord::new("policy lowercase", "x", 4u64),
        ]);

        assert_eq!(set.len(), 2);
        assert!(set.contains("ScheduleState Defined Policy"));
        assert!(set.contains("Exit Policy"));
        assert!(!set.contains("columnWidths"));
        // matching is case-sensitive
        assert!(!set.contains("policy lowercase"));
    }

    #[test]
    fn test_filter_leaves_fields_untouched() {
        let set = PreferenceSet::from_records([PreferenceRecord::new("Entry Policy", " spaced ", 77u64)]);
        let record = set.get("Entry Policy").unwrap();
        assert_eq!(record.value, " spaced ");
        assert_eq!(record.remote_id, RemoteId::new("77"));
    }

    #[test]
    fn test_insert_reports_rejection() {
        let mut set = PreferenceSet::new();
        assert!(!set.insert(PreferenceRecord::new("cardFields", "Name", 1u64)));
        assert!(set.is_empty());
        assert!(set.insert(PreferenceRecord::new("Entry Policy", "x", 1u64)));
    }

    #[test]
    fn test_duplicate_name_last_wins() {
        let set = PreferenceSet::from_records([
            PreferenceRecord::new("Entry Policy", "old", 1u64),
            PreferenceRecord::new("Entry Policy", "new", 2u64),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("Entry Policy").unwrap().value, "new");
    }

    #[test]
    fn test_remote_id_accepts_number_or_string() {
        let n: RemoteId = serde_json::from_str("9552890650").unwrap();
        let s: RemoteId = serde_json::from_str("\"9552890650\"").unwrap();
        assert_eq!(n, s);
        assert_eq!(n.as_str(), "9552890650");
    }

    #[test]
    fn test_batch_job_display() {
        let job = BatchJob::new("11", "22", "33").with_names("Alpha", "Beta");
        assert_eq!(job.to_string(), "app 11: Alpha (22) -> Beta (33)");
    }
}
