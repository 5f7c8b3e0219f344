//! Store adapter: the persistence port behind the queue manager.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;

use vidgen_models::{Job, JobId};

use crate::config::StoreBackend;
use crate::error::QueueResult;

/// Persistence port for job records and queue order.
///
/// Implementations make every transition atomic per job: the precondition
/// check and the write happen inside one critical section (memory) or one
/// script invocation (Redis), so a losing concurrent writer observes
/// `InvalidTransition` rather than clobbering state. Queue membership moves
/// in the same atomic step as the status it mirrors: `mark_queued` appends
/// to the tail, leaving Queued removes the id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Which variant this is, for diagnostics.
    fn backend(&self) -> StoreBackend;

    /// Persist a newly created job.
    async fn insert(&self, job: &Job) -> QueueResult<()>;

    /// Current record for a job, if known.
    async fn fetch(&self, job_id: &JobId) -> QueueResult<Option<Job>>;

    /// Every known record, in unspecified order.
    async fn list(&self) -> QueueResult<Vec<Job>>;

    /// Queued job ids in arrival order. Queue length and position are both
    /// answered from this one sequence.
    async fn queued_ids(&self) -> QueueResult<Vec<JobId>>;

    /// Number of currently queued jobs.
    async fn queue_len(&self) -> QueueResult<u64>;

    /// Pending -> Queued, appending to the queue tail.
    async fn mark_queued(&self, job_id: &JobId) -> QueueResult<Job>;

    /// Queued -> Running on first call, progress updates while Running.
    /// Returns the stored record, which is newer than the update when a
    /// lower progress value arrived late and was dropped.
    async fn record_progress(&self, job_id: &JobId, progress: u8, step: &str)
        -> QueueResult<Job>;

    /// Running -> Completed.
    async fn mark_completed(&self, job_id: &JobId, video_url: &str) -> QueueResult<Job>;

    /// Pending/Queued/Running -> Failed.
    async fn mark_failed(&self, job_id: &JobId, error_message: &str) -> QueueResult<Job>;
}
