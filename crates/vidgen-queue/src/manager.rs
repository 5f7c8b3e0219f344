//! Queue manager: the façade every producer, worker, and reader goes
//! through.

use std::sync::Arc;

use tracing::{debug, info, warn};

use vidgen_models::{Job, JobId, JobOptions, JobStatus};

use crate::config::{QueueConfig, StoreBackend};
use crate::error::{QueueError, QueueResult};
use crate::store::{JobStore, MemoryStore, RedisStore};

/// Filter for [`QueueManager::list_jobs`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    /// Only return jobs in this status.
    pub status: Option<JobStatus>,
    /// Return currently queued jobs in FIFO arrival order instead of every
    /// job in insertion order.
    pub queue_order: bool,
}

impl JobFilter {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Store variant answering the counts
    pub backend: StoreBackend,
    /// Jobs currently waiting in the queue
    pub queued: u64,
    /// Every job the store knows about
    pub total: u64,
}

/// Job tracking and queue façade.
///
/// The manager owns the authoritative copy of every job; callers only ever
/// receive owned copies, and all mutation goes through the operations below,
/// each atomic with respect to the chosen store.
///
/// There is no reaper: a Running job whose worker died stays Running until
/// something calls [`QueueManager::mark_job_failed`]. That cleanup belongs
/// to the operator, not this subsystem.
pub struct QueueManager {
    store: Arc<dyn JobStore>,
}

impl QueueManager {
    /// Build a manager around an injected store. Tests use this with
    /// [`MemoryStore`] to get isolated instances.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Select the store variant from configuration, once. Redis trouble
    /// after this point surfaces as [`QueueError::StoreUnavailable`], never
    /// as a fallback to the memory variant.
    pub fn from_config(config: &QueueConfig) -> QueueResult<Self> {
        let store: Arc<dyn JobStore> = match config.backend {
            StoreBackend::Redis => {
                info!(redis_url = %config.redis_url, "job store: redis");
                Arc::new(RedisStore::new(config)?)
            }
            StoreBackend::Memory => {
                info!("job store: in-memory");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::new(store))
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::from_config(&QueueConfig::from_env())
    }

    /// Create a job in Pending. Never enqueues.
    pub async fn create_job(
        &self,
        script: impl Into<String>,
        image_prompts: Vec<String>,
        options: JobOptions,
    ) -> QueueResult<JobId> {
        let job = Job::new(script, image_prompts, options)?;
        let job_id = job.job_id.clone();
        self.store.insert(&job).await?;
        info!(job_id = %job_id, prompts = job.image_prompts.len(), "created job");
        Ok(job_id)
    }

    /// Append a Pending job to the queue tail.
    pub async fn queue_job(&self, job_id: &JobId) -> QueueResult<Job> {
        let job = self
            .store
            .mark_queued(job_id)
            .await
            .inspect_err(|e| warn_rejected(job_id, "queue_job", e))?;
        info!(job_id = %job_id, "queued job");
        Ok(job)
    }

    /// Current snapshot of a job. An unknown id is `Ok(None)`, not an
    /// error: polling for a job that expired is an expected outcome.
    pub async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        self.store.fetch(job_id).await
    }

    /// Report worker progress, entering Running from Queued on the first
    /// call (which sets `started_at` and resets the progress baseline).
    ///
    /// Progress is clamped to 0-100. While Running, an update carrying a
    /// lower value than the stored one is dropped and the stored record
    /// returned, so visible progress never regresses.
    pub async fn update_job_progress(
        &self,
        job_id: &JobId,
        progress: u8,
        step: &str,
    ) -> QueueResult<Job> {
        let job = self
            .store
            .record_progress(job_id, progress, step)
            .await
            .inspect_err(|e| warn_rejected(job_id, "update_job_progress", e))?;
        debug!(job_id = %job_id, progress = job.progress, step = %job.current_step, "progress");
        Ok(job)
    }

    /// Running -> Completed, recording the result URL.
    pub async fn mark_job_completed(
        &self,
        job_id: &JobId,
        video_url: &str,
    ) -> QueueResult<Job> {
        let job = self
            .store
            .mark_completed(job_id, video_url)
            .await
            .inspect_err(|e| warn_rejected(job_id, "mark_job_completed", e))?;
        info!(job_id = %job_id, video_url = %video_url, "job completed");
        Ok(job)
    }

    /// Pending/Queued/Running -> Failed, recording the error. Also the way
    /// to abort a job before a worker claims it.
    pub async fn mark_job_failed(
        &self,
        job_id: &JobId,
        error_message: &str,
    ) -> QueueResult<Job> {
        let job = self
            .store
            .mark_failed(job_id, error_message)
            .await
            .inspect_err(|e| warn_rejected(job_id, "mark_job_failed", e))?;
        warn!(job_id = %job_id, error = %error_message, "job failed");
        Ok(job)
    }

    /// Number of currently queued jobs.
    pub async fn get_queue_length(&self) -> QueueResult<u64> {
        self.store.queue_len().await
    }

    /// Zero-based position of a job among currently queued jobs, in arrival
    /// order. `NotFound` when the job is not queued right now, whether or
    /// not it exists.
    pub async fn get_job_position(&self, job_id: &JobId) -> QueueResult<usize> {
        let ids = self.store.queued_ids().await?;
        ids.iter()
            .position(|id| id == job_id)
            .ok_or_else(|| QueueError::not_found(job_id))
    }

    /// All known jobs, optionally filtered by status. Insertion order by
    /// default; FIFO queue order (currently queued jobs only) on request.
    pub async fn list_jobs(&self, filter: &JobFilter) -> QueueResult<Vec<Job>> {
        let mut jobs = if filter.queue_order {
            let ids = self.store.queued_ids().await?;
            let mut jobs = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(job) = self.store.fetch(&id).await? {
                    jobs.push(job);
                }
            }
            jobs
        } else {
            let mut jobs = self.store.list().await?;
            jobs.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.job_id.as_str().cmp(b.job_id.as_str()))
            });
            jobs
        };

        if let Some(status) = filter.status {
            jobs.retain(|job| job.status == status);
        }
        Ok(jobs)
    }

    /// Point-in-time counters for status endpoints.
    pub async fn queue_stats(&self) -> QueueResult<QueueStats> {
        let queued = self.store.queue_len().await?;
        let total = self.store.list().await?.len() as u64;
        Ok(QueueStats {
            backend: self.store.backend(),
            queued,
            total,
        })
    }
}

fn warn_rejected(job_id: &JobId, op: &str, err: &QueueError) {
    if matches!(err, QueueError::InvalidTransition(_)) {
        warn!(job_id = %job_id, "{} rejected: {}", op, err);
    }
}
