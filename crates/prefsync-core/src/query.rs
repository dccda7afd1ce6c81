//! Request descriptors for reading, creating, and updating preferences.
//!
//! Building a descriptor performs no I/O. Every interpolated value goes through
//! [`Url::query_pairs_mut`] or path segment encoding, so identifiers and query
//! text reach the store percent-encoded.

use url::Url;

use crate::error::SyncError;
use crate::model::RemoteId;

/// Records requested per read.
pub const PAGE_SIZE: u32 = 200;

/// Fields requested for each preference on read.
pub const PREFERENCE_FETCH: &str = "ObjectID,AppId,Name,Value,CreationDate,Project,User,Workspace";

const PREFERENCE_RESOURCE: &str = "Preference";

/// Store reference for a project scope, as used in queries and payloads.
pub fn project_ref(project_id: &str) -> String {
    format!("/project/{project_id}")
}

/// A paged read of the preferences for one (project, app) scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadQuery {
    pub project_id: String,
    pub app_id: String,
    /// 1-based index of the first record on the page.
    pub start: u32,
    pub page_size: u32,
    pub url: Url,
}

/// Address of the create endpoint for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub project_id: String,
    pub url: Url,
}

/// Address of one existing preference within a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub project_id: String,
    pub remote_id: RemoteId,
    pub url: Url,
}

/// Builds descriptors against `<base_url>/webservice/<version>/Preference`.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    api_root: Url,
}

impl QueryBuilder {
    pub fn new(base_url: &str, wsapi_version: &str) -> Result<Self, SyncError> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(SyncError::validation("base url", "must not be empty"));
        }
        let version = require("wsapi version", wsapi_version)?;
        let mut api_root = Url::parse(base_url)
            .map_err(|e| SyncError::validation("base url", format!("{base_url}: {e}")))?;
        api_root
            .path_segments_mut()
            .map_err(|_| SyncError::validation("base url", format!("{base_url} cannot be a base")))?
            .pop_if_empty()
            .extend(["webservice", version]);
        Ok(Self { api_root })
    }

    /// Root of the versioned web service, e.g. `.../slm/webservice/v2.0`.
    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    /// URL of an arbitrary resource path under the web service root.
    pub fn resource_url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// Read of the first page (`start = 1`).
    pub fn build_read_query(&self, project_id: &str, app_id: &str) -> Result<ReadQuery, SyncError> {
        self.build_read_page(project_id, app_id, 1)
    }

    /// Read of the page beginning at the 1-based `start` index.
    pub fn build_read_page(&self, project_id: &str, app_id: &str, start: u32) -> Result<ReadQuery, SyncError> {
        let project_id = require("project id", project_id)?;
        let app_id = require("app id", app_id)?;
        if start == 0 {
            return Err(SyncError::validation("start", "page index is 1-based"));
        }

        let project = project_ref(project_id);
        let filter = format!("((AppId = {app_id}) AND (Project = \"{project}\"))");
        let mut url = self.resource_url(&[PREFERENCE_RESOURCE]);
        url.query_pairs_mut()
            .append_pair("start", &start.to_string())
            .append_pair("pagesize", &PAGE_SIZE.to_string())
            .append_pair("query", &filter)
            .append_pair("fetch", PREFERENCE_FETCH)
            .append_pair("project", &project);

        Ok(ReadQuery {
            project_id: project_id.to_string(),
            app_id: app_id.to_string(),
            start,
            page_size: PAGE_SIZE,
            url,
        })
    }

    pub fn build_create_request(&self, project_id: &str) -> Result<CreateRequest, SyncError> {
        let project_id = require("project id", project_id)?;
        let mut url = self.resource_url(&[PREFERENCE_RESOURCE, "create"]);
        append_write_params(&mut url, project_id);
        Ok(CreateRequest {
            project_id: project_id.to_string(),
            url,
        })
    }

    pub fn build_update_request(&self, project_id: &str, remote_id: &RemoteId) -> Result<UpdateRequest, SyncError> {
        let project_id = require("project id", project_id)?;
        let id = require("remote id", remote_id.as_str())?;
        let mut url = self.resource_url(&[PREFERENCE_RESOURCE, id]);
        append_write_params(&mut url, project_id);
        Ok(UpdateRequest {
            project_id: project_id.to_string(),
            remote_id: remote_id.clone(),
            url,
        })
    }
}

fn append_write_params(url: &mut Url, project_id: &str) {
    url.query_pairs_mut()
        .append_pair("fetch", "true")
        .append_pair("includePermissions", "true")
        .append_pair("project", &project_ref(project_id));
}

fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str, SyncError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SyncError::validation(field, "must not be empty"));
    }
    Ok(trimmed)
}
