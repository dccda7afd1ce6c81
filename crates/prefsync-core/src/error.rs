//! Error types for preference loading, reconciliation, and application.
//!
//! Two layers exist: [`StoreError`] describes what went wrong talking to the
//! remote store, and [`SyncError`] places that failure at a job or action
//! boundary so the batch can carry on.

use thiserror::Error;

/// Errors raised by a [`PreferenceStore`](crate::store::PreferenceStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response.
    #[error("Connection error: {context}: {source}")]
    Connection {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// The store answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be decoded into the expected envelope.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// The store reported an error list for a read.
    #[error("Store rejected request: {}", .errors.join("; "))]
    Rejected { errors: Vec<String> },

    /// The client could not be set up from its configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Session authorization failed.
    #[error("Authorization failed: {message}")]
    Unauthorized { message: String },
}

impl StoreError {
    /// Creates a new `Connection` error.
    pub fn connection(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Connection {
            context: context.into(),
            source,
        }
    }

    /// Creates a new `Http` error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Creates a new `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a new `Unauthorized` error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_response(err.to_string())
    }
}

/// Failures that stop a single job or a single action, never the whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A malformed identifier or field was caught before any call was made.
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// A preference set could not be fetched.
    #[error("Failed to load preferences for project {project_id} (app {app_id}): {source}")]
    Load {
        project_id: String,
        app_id: String,
        #[source]
        source: StoreError,
    },

    /// The store refused a create or update.
    #[error("Failed to apply preference {name}: {}", .errors.join("; "))]
    Apply { name: String, errors: Vec<String> },

    /// A job panicked and was stopped at the job boundary.
    #[error("Unexpected fault: {message}")]
    Fault { message: String },
}

impl SyncError {
    /// Create a new Validation error
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a new Load error
    pub fn load(project_id: impl Into<String>, app_id: impl Into<String>, source: StoreError) -> Self {
        Self::Load {
            project_id: project_id.into(),
            app_id: app_id.into(),
            source,
        }
    }

    /// Create a new Apply error
    pub fn apply(name: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Apply {
            name: name.into(),
            errors,
        }
    }

    /// Create a new Fault error
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault {
            message: message.into(),
        }
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Load { .. } => ErrorCategory::Load,
            Self::Apply { .. } => ErrorCategory::Apply,
            Self::Fault { .. } => ErrorCategory::Fault,
        }
    }
}

/// Where in the pipeline a failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Load,
    Apply,
    Fault,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Load => write!(f, "load"),
            ErrorCategory::Apply => write!(f, "apply"),
            ErrorCategory::Fault => write!(f, "fault"),
        }
    }
}
