//! The remote preference store abstraction and its wire types.
//!
//! Read, create, and update each have their own response envelope. The engine
//! never inspects raw JSON; it reads error lists through [`WriteResponse`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::model::{PreferenceRecord, RemoteId};
use crate::query::{CreateRequest, ReadQuery, UpdateRequest};

/// Backend holding preference records.
///
/// Calls are issued one at a time by the engine; implementations must still be
/// `Send + Sync` so a store can be shared behind an `Arc`.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Reads one page of preferences for the scope described by `query`.
    ///
    /// # Errors
    ///
    /// Returns an error for transport or decoding failures. A store-reported
    /// error list is returned inside the [`QueryResult`].
    async fn query(&self, query: &ReadQuery) -> Result<QueryResult, StoreError>;

    /// Creates a preference in the project addressed by `request`.
    async fn create(
        &self,
        request: &CreateRequest,
        preference: &NewPreference,
    ) -> Result<CreateResult, StoreError>;

    /// Overwrites the value of the preference addressed by `request`.
    async fn update(
        &self,
        request: &UpdateRequest,
        update: &PreferenceUpdate,
    ) -> Result<OperationResult, StoreError>;
}

/// A preference as returned by a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPreference {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<String>,
    #[serde(rename = "ObjectID")]
    pub object_id: RemoteId,
}

impl From<RawPreference> for PreferenceRecord {
    fn from(raw: RawPreference) -> Self {
        PreferenceRecord {
            name: raw.name,
            value: raw.value.unwrap_or_default(),
            remote_id: raw.object_id,
        }
    }
}

/// Body of a read response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResult {
    #[serde(default)]
    pub total_result_count: u64,
    #[serde(default)]
    pub start_index: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u64>,
    #[serde(default)]
    pub results: Vec<RawPreference>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryEnvelope {
    #[serde(rename = "QueryResult")]
    pub query_result: QueryResult,
}

/// Fields sent when creating a preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPreference {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
    /// Project reference, `/project/<id>`.
    #[serde(rename = "Project")]
    pub project: String,
    #[serde(rename = "AppID")]
    pub app_id: String,
}

/// Fields sent when updating a preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreferenceUpdate {
    #[serde(rename = "Value")]
    pub value: String,
}

/// Wraps a payload as `{ "Preference": ... }`.
#[derive(Debug, Serialize)]
pub struct PreferencePayload<'a, T: Serialize> {
    #[serde(rename = "Preference")]
    pub preference: &'a T,
}

impl<'a, T: Serialize> PreferencePayload<'a, T> {
    pub fn new(preference: &'a T) -> Self {
        Self { preference }
    }
}

/// Error list carried by a create or update response.
pub trait WriteResponse {
    fn errors(&self) -> &[String];

    fn is_success(&self) -> bool {
        self.errors().is_empty()
    }
}

/// Body of a create response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateResult {
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// The created object echoed back by the store.
    #[serde(default)]
    pub object: Option<Value>,
}

impl WriteResponse for CreateResult {
    fn errors(&self) -> &[String] {
        &self.errors
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEnvelope {
    #[serde(rename = "CreateResult")]
    pub create_result: CreateResult,
}

/// Body of an update response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OperationResult {
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub object: Option<Value>,
}

impl WriteResponse for OperationResult {
    fn errors(&self) -> &[String] {
        &self.errors
    }
}

#[derive(Debug, Deserialize)]
pub struct OperationEnvelope {
    #[serde(rename = "OperationResult")]
    pub operation_result: OperationResult,
}
