//! Job lifecycle states and their legal transitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created but not yet enqueued
    #[default]
    Pending,
    /// Waiting in the queue for a worker
    Queued,
    /// A worker is processing the job
    Running,
    /// Job finished successfully
    Completed,
    /// Job finished with an error
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `to` is a legal lifecycle transition.
    ///
    /// Pending and Queued may fail directly so a job can be aborted before a
    /// worker claims it.
    pub fn can_transition(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Queued)
                | (Queued, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Pending, Failed)
                | (Queued, Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A status string that is not one of the known lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job status: {0}")]
pub struct UnknownStatusError(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatusError(other.to_string())),
        }
    }
}
