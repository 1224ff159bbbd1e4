//! Error types for revio.
//!
//! The taxonomy distinguishes permanent failures (never retried) from
//! transient failures (retried until the job's attempt budget is exhausted).
//! `Error::is_transient` is the single predicate the worker consults when
//! deciding between the retry edge and the failed terminal state.

use thiserror::Error;

/// Result type alias using revio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for revio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Material could not be resolved (permanent)
    #[error("Material not found: {0}")]
    MaterialNotFound(uuid::Uuid),

    /// No usable text after extraction/cleaning (permanent)
    #[error("Extraction failure: {0}")]
    ExtractionFailure(String),

    /// Model backend call exceeded its deadline (transient)
    #[error("Backend timeout: {0}")]
    BackendTimeout(String),

    /// Model backend returned an error or garbled output (transient)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Persisting a job state transition failed (transient)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this failure class is retryable.
    ///
    /// Transient failures increment the job's attempt count and requeue it;
    /// permanent failures short-circuit the job to `failed` with no retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::BackendTimeout(_)
                | Error::Backend(_)
                | Error::Persistence(_)
                | Error::Database(_)
                | Error::Io(_)
        )
    }

    /// Stable machine-readable error code exposed by the status API.
    ///
    /// The status API never exposes internal messages beyond these codes
    /// plus a short human-readable summary.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "database_error",
            Error::MaterialNotFound(_) => "material_not_found",
            Error::ExtractionFailure(_) => "extraction_failure",
            Error::BackendTimeout(_) => "backend_timeout",
            Error::Backend(_) => "backend_error",
            Error::Persistence(_) => "persistence_failure",
            Error::Job(_) => "job_error",
            Error::Serialization(_) => "serialization_error",
            Error::Config(_) => "config_error",
            Error::InvalidInput(_) => "invalid_input",
            Error::Internal(_) => "internal_error",
            Error::Io(_) => "io_error",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::BackendTimeout(e.to_string())
        } else {
            Error::Backend(e.to_string())
        }
    }
}
