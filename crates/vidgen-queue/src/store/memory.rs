//! In-memory store variant.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use vidgen_models::{InvalidTransition, Job, JobId, JobStatus};

use crate::config::StoreBackend;
use crate::error::{QueueError, QueueResult};
use crate::store::JobStore;

/// Mutable store state, only ever touched while holding the lock.
#[derive(Default)]
struct MemoryState {
    /// All job records, single source of truth
    jobs: HashMap<JobId, Job>,
    /// Queued job ids in arrival order
    queue: VecDeque<JobId>,
}

/// Process-local store: a job map plus a FIFO id queue behind one lock.
///
/// Every operation holds the lock only for its critical section, so the
/// check-then-write of a transition cannot interleave with another writer.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one transition under the lock: fetch, apply, sync the queue
    /// membership with the status change, write back.
    async fn apply<F>(&self, job_id: &JobId, transition: F) -> QueueResult<Job>
    where
        F: FnOnce(Job) -> Result<Job, InvalidTransition>,
    {
        let mut state = self.state.lock().await;

        let job = state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| QueueError::not_found(job_id))?;
        let was_queued = job.status == JobStatus::Queued;

        let updated = transition(job)?;

        if was_queued && updated.status != JobStatus::Queued {
            state.queue.retain(|id| id != job_id);
        } else if !was_queued && updated.status == JobStatus::Queued {
            state.queue.push_back(job_id.clone());
        }
        state.jobs.insert(job_id.clone(), updated.clone());

        Ok(updated)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    async fn insert(&self, job: &Job) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        state.jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn fetch(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        let state = self.state.lock().await;
        Ok(state.jobs.get(job_id).cloned())
    }

    async fn list(&self) -> QueueResult<Vec<Job>> {
        let state = self.state.lock().await;
        Ok(state.jobs.values().cloned().collect())
    }

    async fn queued_ids(&self) -> QueueResult<Vec<JobId>> {
        let state = self.state.lock().await;
        Ok(state.queue.iter().cloned().collect())
    }

    async fn queue_len(&self) -> QueueResult<u64> {
        let state = self.state.lock().await;
        Ok(state.queue.len() as u64)
    }

    async fn mark_queued(&self, job_id: &JobId) -> QueueResult<Job> {
        self.apply(job_id, |job| job.queued()).await
    }

    async fn record_progress(
        &self,
        job_id: &JobId,
        progress: u8,
        step: &str,
    ) -> QueueResult<Job> {
        self.apply(job_id, |job| job.record_progress(progress, step))
            .await
    }

    async fn mark_completed(&self, job_id: &JobId, video_url: &str) -> QueueResult<Job> {
        self.apply(job_id, |job| job.completed(video_url)).await
    }

    async fn mark_failed(&self, job_id: &JobId, error_message: &str) -> QueueResult<Job> {
        self.apply(job_id, |job| job.failed(error_message)).await
    }
}
