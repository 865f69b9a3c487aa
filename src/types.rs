//! Shared error taxonomy for the ingestion-to-decision pipeline.
//!
//! Propagation policy:
//!
//! * [`PolicyError::Validation`] is hard and synchronous, rejected before any
//!   background work starts.
//! * [`PolicyError::NotFound`] surfaces unknown identifiers to the caller.
//! * [`PolicyError::ExternalService`] marks a failed or malformed capability
//!   call. On the query path it degrades to a needs-review decision; during
//!   ingestion it halts the task without rolling back persisted clauses.
//! * An empty clause corpus is *not* an error anywhere: searches return empty
//!   results and rebuilds produce an explicitly empty index.

use thiserror::Error;

/// Errors produced by stores, capabilities, and pipeline orchestration.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Input rejected before any work started (duplicate name, empty upload).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced document, clause, query, or task does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An external capability (embedding, completion, extraction) failed,
    /// timed out, or returned output we could not use.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// The backing store rejected or failed an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem or transport level failure.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PolicyError {
    fn from(err: std::io::Error) -> Self {
        PolicyError::Io(err.to_string())
    }
}

impl From<tokio_rusqlite::Error> for PolicyError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        PolicyError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for PolicyError {
    fn from(err: reqwest::Error) -> Self {
        PolicyError::ExternalService(err.to_string())
    }
}

impl PolicyError {
    /// True when the failure came from an external capability rather than
    /// local state. The query pipeline uses this to pick its diagnostic text.
    pub fn is_external(&self) -> bool {
        matches!(self, PolicyError::ExternalService(_))
    }
}
