//! Error type definitions for the audit engine
//!
//! The admission path has its own error enum because those failures are the
//! only ones a caller ever sees synchronously; everything that happens after a
//! job is durably written is reported through job state, not through errors.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Admission errors from the job scheduler
    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised while deciding whether new work may be admitted
///
/// These are caller-visible and non-retryable by the engine itself; the
/// caller decides whether to back off and try again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdmissionError {
    /// The caller may not act on the requested resource
    #[error("Access denied for resource {resource_id}")]
    AccessDenied { resource_id: String },

    /// The per-resource concurrency cap is exhausted
    #[error("Resource {resource_id} has {active} active jobs (limit {limit})")]
    ResourceSaturated {
        resource_id: String,
        active: u64,
        limit: u64,
    },

    /// The global queue depth ceiling is exhausted
    #[error("Queue is full ({depth} pending jobs), retry after {retry_after_secs}s")]
    QueueFull { depth: u64, retry_after_secs: u64 },

    /// Too many monitoring runs are still in flight
    #[error("{unfinished} monitoring runs in flight (limit {limit})")]
    MonitorSaturated { unfinished: u64, limit: u64 },

    /// The config's daily run budget is spent until the day rolls over
    #[error("Config {config_id} reached its daily run cap ({cap}), retry after {retry_after_secs}s")]
    DailyCapReached {
        config_id: String,
        cap: u32,
        retry_after_secs: u64,
    },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Record not found
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// An optimistic (conditional) update matched no rows
    #[error("Conflicting update: {resource} {id} was not in the expected state")]
    Conflict { resource: String, id: String },

    /// A stored enum value could not be parsed back into its Rust type
    #[error("Invalid stored value for {field}: '{value}'")]
    InvalidStoredValue { field: String, value: String },
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    /// Create a not-found error for a table/id pair
    pub fn not_found<R: Into<String>, I: ToString>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }
}
