//! Queue error types.

use thiserror::Error;
use vidgen_models::{InvalidTransition, JobValidationError, SnapshotError};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("validation failed: {0}")]
    Validation(#[from] JobValidationError),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] redis::RedisError),

    #[error("corrupt job record: {0}")]
    Deserialization(#[from] SnapshotError),
}

impl QueueError {
    pub fn not_found(job_id: impl std::fmt::Display) -> Self {
        Self::NotFound(job_id.to_string())
    }
}
