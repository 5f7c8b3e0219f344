//! Shared data models for the VidGen backend.
//!
//! This crate provides Serde-serializable types for:
//! - Generation jobs and their lifecycle states
//! - Submission options (voice, format, effects)
//! - Snapshot wire format for persisted job records

pub mod job;
pub mod job_status;
pub mod snapshot;

// Re-export common types
pub use job::{InvalidTransition, Job, JobId, JobOptions, JobValidationError};
pub use job_status::{JobStatus, UnknownStatusError};
pub use snapshot::{JobSnapshot, SnapshotError};
