//! Backend error types

use thiserror::Error;

/// Errors that can occur when talking to the hosted backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No row returned from {0}")]
    EmptyResult(String),

    #[error("Object already exists: {0}")]
    Conflict(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),
}

impl BackendError {
    /// Classify a transport error the same way for every call site
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_connect() {
            BackendError::Unavailable
        } else {
            BackendError::Request(e)
        }
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
