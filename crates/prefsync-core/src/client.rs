//! HTTP implementation of [`PreferenceStore`] for the Rally web services API.

use std::fmt;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::StoreError;
use crate::query::{CreateRequest, QueryBuilder, ReadQuery, UpdateRequest};
use crate::store::{
    CreateEnvelope, CreateResult, NewPreference, OperationEnvelope, OperationResult,
    PreferencePayload, PreferenceStore, PreferenceUpdate, QueryEnvelope, QueryResult,
};

pub const DEFAULT_BASE_URL: &str = "https://rally1.rallydev.com/slm";
pub const DEFAULT_WSAPI_VERSION: &str = "v2.0";

/// How requests are authenticated.
#[derive(Clone)]
pub enum Credentials {
    /// HTTP Basic Auth. Writes additionally need a security token.
    Basic { username: String, password: String },
    /// API key sent in the `ZSESSIONID` header.
    ApiKey { key: String },
}

impl Credentials {
    /// Short description safe for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Basic { username, .. } => format!("UserID: {username}"),
            Self::ApiKey { .. } => "API key".to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::ApiKey { .. } => f.debug_struct("ApiKey").field("key", &"<redacted>").finish(),
        }
    }
}

/// Optional `X-RallyIntegration*` headers identifying the calling tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationHeaders {
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub version: Option<String>,
}

impl IntegrationHeaders {
    fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("X-RallyIntegrationName", self.name.as_deref()),
            ("X-RallyIntegrationVendor", self.vendor.as_deref()),
            ("X-RallyIntegrationVersion", self.version.as_deref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
    }
}

/// Everything needed to open a session against the store.
#[derive(Debug, Clone)]
pub struct RallyConfig {
    pub base_url: String,
    pub wsapi_version: String,
    pub credentials: Credentials,
    pub integration: IntegrationHeaders,
}

impl RallyConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            wsapi_version: DEFAULT_WSAPI_VERSION.to_string(),
            credentials,
            integration: IntegrationHeaders::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_wsapi_version(mut self, version: impl Into<String>) -> Self {
        self.wsapi_version = version.into();
        self
    }

    pub fn with_integration(mut self, integration: IntegrationHeaders) -> Self {
        self.integration = integration;
        self
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizeEnvelope {
    #[serde(rename = "OperationResult")]
    operation_result: AuthorizeResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthorizeResult {
    #[serde(default)]
    security_token: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

/// A session against the store. One instance is reused for the whole run.
pub struct RallyClient {
    http: reqwest::Client,
    queries: QueryBuilder,
    credentials: Credentials,
    integration: IntegrationHeaders,
    security_token: Option<String>,
}

impl RallyClient {
    /// Builds a client without contacting the store.
    pub fn new(config: &RallyConfig) -> Result<Self, StoreError> {
        let queries = QueryBuilder::new(&config.base_url, &config.wsapi_version)
            .map_err(|e| StoreError::configuration(e.to_string()))?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| StoreError::configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            queries,
            credentials: config.credentials.clone(),
            integration: config.integration.clone(),
            security_token: None,
        })
    }

    /// Builds a client and, for Basic Auth, obtains the security token that
    /// create and update calls must carry.
    pub async fn connect(config: &RallyConfig) -> Result<Self, StoreError> {
        let mut client = Self::new(config)?;
        if matches!(client.credentials, Credentials::Basic { .. }) {
            client.authorize().await?;
        }
        Ok(client)
    }

    /// Request descriptor builder bound to this client's base URL.
    pub fn queries(&self) -> &QueryBuilder {
        &self.queries
    }

    pub fn security_token(&self) -> Option<&str> {
        self.security_token.as_deref()
    }

    async fn authorize(&mut self) -> Result<(), StoreError> {
        let url = self.queries.resource_url(&["security", "authorize"]);
        tracing::debug!(%url, "requesting security token");
        let envelope: AuthorizeEnvelope = self.send(Method::GET, url, None).await?;
        let result = envelope.operation_result;
        if !result.errors.is_empty() {
            return Err(StoreError::unauthorized(result.errors.join("; ")));
        }
        match result.security_token {
            Some(token) if !token.is_empty() => {
                self.security_token = Some(token);
                Ok(())
            }
            _ => Err(StoreError::unauthorized("no security token in response")),
        }
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        match &self.credentials {
            Credentials::Basic { username, password } => {
                req = req.basic_auth(username, Some(password));
            }
            Credentials::ApiKey { key } => {
                req = req.header("ZSESSIONID", key);
            }
        }
        for (name, value) in self.integration.pairs() {
            req = req.header(name, value);
        }
        req.header("Accept", "application/json")
    }

    /// Adds the security token to a write URL when the session has one.
    fn write_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        if let Some(token) = &self.security_token {
            url.query_pairs_mut().append_pair("key", token);
        }
        url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, StoreError> {
        let context = format!("{method} {}", url.path());
        let mut req = self.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::connection(context, e))?;
        handle_response(resp).await
    }
}

#[async_trait]
impl PreferenceStore for RallyClient {
    async fn query(&self, query: &ReadQuery) -> Result<QueryResult, StoreError> {
        tracing::debug!(url = %query.url, "reading preferences");
        let envelope: QueryEnvelope = self.send(Method::GET, query.url.clone(), None).await?;
        Ok(envelope.query_result)
    }

    async fn create(
        &self,
        request: &CreateRequest,
        preference: &NewPreference,
    ) -> Result<CreateResult, StoreError> {
        tracing::debug!(url = %request.url, name = %preference.name, "creating preference");
        let body = serde_json::to_value(PreferencePayload::new(preference))?;
        let envelope: CreateEnvelope = self
            .send(Method::PUT, self.write_url(&request.url), Some(body))
            .await?;
        Ok(envelope.create_result)
    }

    async fn update(
        &self,
        request: &UpdateRequest,
        update: &PreferenceUpdate,
    ) -> Result<OperationResult, StoreError> {
        tracing::debug!(url = %request.url, remote_id = %request.remote_id, "updating preference");
        let body = serde_json::to_value(PreferencePayload::new(update))?;
        let envelope: OperationEnvelope = self
            .send(Method::POST, self.write_url(&request.url), Some(body))
            .await?;
        Ok(envelope.operation_result)
    }
}

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, StoreError> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        if let Ok(json) = serde_json::from_str::<Value>(&body) {
            let errors = envelope_errors(&json);
            if !errors.is_empty() {
                return Err(StoreError::http(status.as_u16(), errors.join("; ")));
            }
        }
        return Err(StoreError::http(status.as_u16(), body));
    }

    serde_json::from_str(&body)
        .map_err(|e| StoreError::invalid_response(format!("failed to parse response JSON: {e}")))
}

/// Collects `Errors` from whichever result object wraps the response.
fn envelope_errors(json: &Value) -> Vec<String> {
    json.as_object()
        .into_iter()
        .flat_map(|obj| obj.values())
        .filter_map(|result| result.get("Errors").and_then(|v| v.as_array()))
        .flatten()
        .filter_map(|e| e.as_str().map(str::to_string))
        .collect()
}
