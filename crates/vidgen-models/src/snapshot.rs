//! Snapshot wire format for job records.
//!
//! A snapshot is the fully-resolved form of a job: the status is its string
//! name and every timestamp is an RFC 3339 string. Readers receive snapshots
//! and the Redis store persists them, so the polling API and the persisted
//! layout stay one and the same format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job_status::UnknownStatusError;
use crate::{Job, JobId, JobOptions};

/// Immutable, fully-resolved view of a [`Job`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub script: String,
    pub image_prompts: Vec<String>,
    #[serde(default)]
    pub options: JobOptions,
    pub status: String,
    pub progress: u8,
    pub current_step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub updated_at: String,
}

/// A persisted record that cannot be turned back into a [`Job`].
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatusError),

    #[error("invalid timestamp in {field}: {source}")]
    Timestamp {
        field: &'static str,
        #[source]
        source: chrono::ParseError,
    },

    #[error("corrupt job record: {0}")]
    Json(#[from] serde_json::Error),
}

impl JobSnapshot {
    /// Parse a snapshot from its JSON encoding. Missing required fields are
    /// rejected here.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON encoding of the snapshot.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, SnapshotError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| SnapshotError::Timestamp { field, source })
}

impl Job {
    /// Produce the fully-resolved snapshot of this job.
    pub fn to_snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.to_string(),
            script: self.script.clone(),
            image_prompts: self.image_prompts.clone(),
            options: self.options.clone(),
            status: self.status.as_str().to_string(),
            progress: self.progress,
            current_step: self.current_step.clone(),
            error_message: self.error_message.clone(),
            video_url: self.video_url.clone(),
            created_at: self.created_at.to_rfc3339(),
            started_at: self.started_at.map(|t| t.to_rfc3339()),
            completed_at: self.completed_at.map(|t| t.to_rfc3339()),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }

    /// Reconstruct a job from a snapshot.
    pub fn from_snapshot(snapshot: &JobSnapshot) -> Result<Self, SnapshotError> {
        Ok(Self {
            job_id: JobId::from_string(snapshot.job_id.clone()),
            script: snapshot.script.clone(),
            image_prompts: snapshot.image_prompts.clone(),
            options: snapshot.options.clone(),
            status: snapshot.status.parse()?,
            progress: snapshot.progress.min(100),
            current_step: snapshot.current_step.clone(),
            error_message: snapshot.error_message.clone(),
            video_url: snapshot.video_url.clone(),
            created_at: parse_timestamp("created_at", &snapshot.created_at)?,
            started_at: snapshot
                .started_at
                .as_deref()
                .map(|t| parse_timestamp("started_at", t))
                .transpose()?,
            completed_at: snapshot
                .completed_at
                .as_deref()
                .map(|t| parse_timestamp("completed_at", t))
                .transpose()?,
            updated_at: parse_timestamp("updated_at", &snapshot.updated_at)?,
        })
    }
}
