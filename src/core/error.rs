//! Error types for queue operations.

use thiserror::Error;

use super::job::JobState;
use super::payload::PayloadError;

/// Errors produced by the job store, client facade, and dispatcher.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A job with this id already exists in the store.
    #[error("duplicate job id: {0}")]
    DuplicateId(String),
    /// No job with this id exists in the store.
    #[error("job not found: {0}")]
    NotFound(String),
    /// A payload could not be marshaled or unmarshaled.
    #[error("serialization error: {0}")]
    Serialization(#[from] PayloadError),
    /// The cancellation signal fired before or during the operation.
    #[error("operation cancelled")]
    Cancelled,
    /// The queue or dispatcher was configured with unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A processor reported a failure for a job.
    #[error("processing error: {0}")]
    Processing(String),
    /// A state change would move a job backwards or out of a terminal state.
    #[error("invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        /// Job identifier.
        id: String,
        /// State the job was in.
        from: JobState,
        /// State that was requested.
        to: JobState,
    },
    /// A worker task could not be joined cleanly.
    #[error("worker join failed: {0}")]
    Join(String),
}

/// Application-facing result using anyhow for processor implementations.
pub type AppResult<T> = Result<T, anyhow::Error>;
