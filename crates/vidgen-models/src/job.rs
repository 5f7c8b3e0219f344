//! Job records for the generation queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::JobStatus;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_voice_provider() -> String {
    "auto".to_string()
}

fn default_voice_type() -> String {
    "narrator".to_string()
}

fn default_language() -> String {
    "pt".to_string()
}

fn default_video_format() -> String {
    "standard".to_string()
}

fn default_effects_preset() -> String {
    "professional".to_string()
}

fn default_enable_effects() -> bool {
    true
}

/// Rendering options chosen at submission time, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOptions {
    /// TTS provider ("auto" lets the worker pick)
    #[serde(default = "default_voice_provider")]
    pub voice_provider: String,
    /// Voice profile for narration
    #[serde(default = "default_voice_type")]
    pub voice_type: String,
    /// Narration language code
    #[serde(default = "default_language")]
    pub language: String,
    /// Output format ("standard", "tiktok", ...)
    #[serde(default = "default_video_format")]
    pub video_format: String,
    /// Visual effects preset applied during assembly
    #[serde(default = "default_effects_preset")]
    pub effects_preset: String,
    /// Whether effects are applied at all
    #[serde(default = "default_enable_effects")]
    pub enable_effects: bool,
    /// Optional image generation preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_preset: Option<String>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            voice_provider: default_voice_provider(),
            voice_type: default_voice_type(),
            language: default_language(),
            video_format: default_video_format(),
            effects_preset: default_effects_preset(),
            enable_effects: default_enable_effects(),
            image_preset: None,
        }
    }
}

/// Rejected job submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobValidationError {
    #[error("script must not be empty")]
    EmptyScript,

    #[error("at least one image prompt is required")]
    NoImagePrompts,
}

/// A lifecycle transition rejected by the legal-transition table.
///
/// The stored record is left untouched when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal job transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One tracked video-generation request.
///
/// Identity fields (`job_id`, `script`, `image_prompts`, `options`,
/// `created_at`) are fixed at creation; the rest is lifecycle state mutated
/// only through the transition methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub job_id: JobId,

    /// Input script text
    pub script: String,

    /// Ordered image prompts, one per scene
    pub image_prompts: Vec<String>,

    /// Submission options
    #[serde(default)]
    pub options: JobOptions,

    /// Lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Progress (0-100), non-decreasing while Running
    #[serde(default)]
    pub progress: u8,

    /// Human-readable label of the current processing step
    pub current_step: String,

    /// Error message (set only on Failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Result URL (set only on Completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Set once, on the first transition into Running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Set once, on entry into a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in Pending.
    pub fn new(
        script: impl Into<String>,
        image_prompts: Vec<String>,
        options: JobOptions,
    ) -> Result<Self, JobValidationError> {
        let script = script.into();
        if script.trim().is_empty() {
            return Err(JobValidationError::EmptyScript);
        }
        if image_prompts.is_empty() {
            return Err(JobValidationError::NoImagePrompts);
        }

        let now = Utc::now();
        Ok(Self {
            job_id: JobId::new(),
            script,
            image_prompts,
            options,
            status: JobStatus::Pending,
            progress: 0,
            current_step: "Waiting to start".to_string(),
            error_message: None,
            video_url: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        })
    }

    fn check_transition(&self, to: JobStatus) -> Result<(), InvalidTransition> {
        if self.status.can_transition(to) {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.status,
                to,
            })
        }
    }

    /// Pending -> Queued. The store appends the id to the queue tail in the
    /// same atomic step.
    pub fn queued(mut self) -> Result<Self, InvalidTransition> {
        self.check_transition(JobStatus::Queued)?;
        self.status = JobStatus::Queued;
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// Record worker progress, entering Running from Queued on the first
    /// call.
    ///
    /// Progress is clamped to 0-100. While Running, a value lower than the
    /// stored one returns the record unchanged so visible progress never
    /// regresses; the fresh Queued -> Running transition starts from a clean
    /// baseline instead.
    pub fn record_progress(mut self, progress: u8, step: &str) -> Result<Self, InvalidTransition> {
        let progress = progress.min(100);

        if self.status == JobStatus::Running {
            if progress < self.progress {
                return Ok(self);
            }
        } else {
            self.check_transition(JobStatus::Running)?;
            self.status = JobStatus::Running;
            if self.started_at.is_none() {
                self.started_at = Some(Utc::now());
            }
        }

        self.progress = progress;
        self.current_step = step.to_string();
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// Running -> Completed.
    pub fn completed(mut self, video_url: impl Into<String>) -> Result<Self, InvalidTransition> {
        self.check_transition(JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.current_step = "Completed".to_string();
        self.video_url = Some(video_url.into());
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// Pending/Queued/Running -> Failed.
    pub fn failed(mut self, error_message: impl Into<String>) -> Result<Self, InvalidTransition> {
        self.check_transition(JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job::new(
            "A short story about tides",
            vec!["moonlit beach".to_string(), "rising waves".to_string()],
            JobOptions::default(),
        )
        .expect("valid job")
    }

    #[test]
    fn test_job_creation() {
        let job = sample_job();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.video_url.is_none());
        assert!(job.error_message.is_none());
        assert_eq!(job.options.voice_provider, "auto");
    }

    #[test]
    fn test_job_validation() {
        assert_eq!(
            Job::new("", vec!["p".to_string()], JobOptions::default()),
            Err(JobValidationError::EmptyScript)
        );
        assert_eq!(
            Job::new("   \n", vec!["p".to_string()], JobOptions::default()),
            Err(JobValidationError::EmptyScript)
        );
        assert_eq!(
            Job::new("script", Vec::new(), JobOptions::default()),
            Err(JobValidationError::NoImagePrompts)
        );
    }

    #[test]
    fn test_job_lifecycle() {
        let job = sample_job().queued().expect("pending -> queued");
        assert_eq!(job.status, JobStatus::Queued);

        let job = job.record_progress(10, "generating images").expect("queued -> running");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress, 10);
        assert_eq!(job.current_step, "generating images");
        assert!(job.started_at.is_some());

        let started_at = job.started_at;
        let job = job.record_progress(60, "rendering").expect("progress while running");
        assert_eq!(job.progress, 60);
        assert_eq!(job.started_at, started_at);

        let job = job.completed("http://cdn/video.mp4").expect("running -> completed");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.video_url.as_deref(), Some("http://cdn/video.mp4"));
        assert!(job.completed_at.is_some());
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_double_queue_is_rejected() {
        let job = sample_job().queued().expect("pending -> queued");
        let err = job.queued().expect_err("queued -> queued must fail");
        assert_eq!(err.from, JobStatus::Queued);
        assert_eq!(err.to, JobStatus::Queued);
    }

    #[test]
    fn test_progress_clamps_and_never_regresses() {
        let job = sample_job().queued().expect("queued");
        let job = job.record_progress(150, "warp speed").expect("running");
        assert_eq!(job.progress, 100);

        let job = job.record_progress(40, "late update").expect("still ok");
        assert_eq!(job.progress, 100);
        // The stale update is dropped wholesale, step included.
        assert_eq!(job.current_step, "warp speed");
    }

    #[test]
    fn test_progress_from_pending_is_rejected() {
        let err = sample_job()
            .record_progress(5, "too eager")
            .expect_err("pending -> running is illegal");
        assert_eq!(err.from, JobStatus::Pending);
        assert_eq!(err.to, JobStatus::Running);
    }

    #[test]
    fn test_abort_before_claim() {
        let job = sample_job().failed("user cancelled").expect("pending -> failed");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("user cancelled"));
        assert!(job.completed_at.is_some());
        assert!(job.video_url.is_none());

        let queued = sample_job().queued().expect("queued");
        assert!(queued.failed("abort").is_ok());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let done = sample_job()
            .queued()
            .and_then(|j| j.record_progress(50, "rendering"))
            .and_then(|j| j.completed("http://x/video.mp4"))
            .expect("completed");

        assert!(done.clone().failed("too late").is_err());
        assert!(done.clone().queued().is_err());
        assert!(done.record_progress(99, "zombie worker").is_err());
    }
}
