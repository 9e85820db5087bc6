//! Cloud provider error types

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error returned by a remote API action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Dotted error code (e.g. "InternalError.DbError", "InvalidParameter")
    pub code: String,

    /// Human readable message
    pub message: String,

    /// Request ID reported by the backend, if any
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Whether the code equals `code` or is a dotted sub-code of it
    ///
    /// `InternalError.DbError` matches `InternalError`.
    pub fn matches(&self, code: &str) -> bool {
        self.code == code
            || self
                .code
                .strip_prefix(code)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(id) = &self.request_id {
            write!(f, " (request id: {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("API error: {0}")]
    Api(ApiError),

    #[error("Non-retryable API error: {0}")]
    Fatal(ApiError),

    #[error("Retry budget of {budget:?} exhausted, last error: {last}")]
    Timeout { budget: Duration, last: Box<CloudError> },

    #[error("{resource} did not converge in time (last status: {last_status})")]
    ConvergenceTimeout { resource: String, last_status: String },

    #[error("{resource} entered failure status {status}")]
    ConvergenceFailed { resource: String, status: String },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid resource id: {0}")]
    InvalidId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether this error means "the resource is absent" rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::ResourceNotFound(_))
    }

    /// Whether a retry budget or convergence wait ran out
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CloudError::Timeout { .. } | CloudError::ConvergenceTimeout { .. }
        )
    }

    /// The remote error carried by this error, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            CloudError::Api(e) | CloudError::Fatal(e) => Some(e),
            CloudError::Timeout { last, .. } => last.api_error(),
            _ => None,
        }
    }
}

impl From<ApiError> for CloudError {
    fn from(err: ApiError) -> Self {
        CloudError::Api(err)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
