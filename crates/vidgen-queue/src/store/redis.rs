//! Redis store variant.
//!
//! Layout: one hash per job at `{prefix}:job:{id}` holding the JSON snapshot
//! in `data` plus `status` and `progress` as scalar fields, and the queued
//! ids in the list `{prefix}:queue`. The scalar fields exist so the
//! transition script can check preconditions without parsing JSON.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::debug;

use vidgen_models::{InvalidTransition, Job, JobId, JobSnapshot, JobStatus, SnapshotError};

use crate::config::{QueueConfig, StoreBackend};
use crate::error::{QueueError, QueueResult};
use crate::store::JobStore;

/// One EVAL per transition keeps check-then-write atomic per job: the status
/// precondition, the monotonic-progress guard, the record write, and the
/// queue-list push/remove all happen inside a single script invocation.
///
/// KEYS: job hash, queue list.
/// ARGV: expected status, snapshot JSON, new status, new progress,
///       queue op (push/remove/none), job id, ttl seconds (0 = none).
const TRANSITION_SCRIPT: &str = r#"
local status = redis.call('HGET', KEYS[1], 'status')
if not status then
  return {'missing', ''}
end
if status ~= ARGV[1] then
  return {'conflict', status}
end
if status == ARGV[3] then
  local current = tonumber(redis.call('HGET', KEYS[1], 'progress')) or 0
  if tonumber(ARGV[4]) < current then
    return {'stale', redis.call('HGET', KEYS[1], 'data') or ''}
  end
end
redis.call('HSET', KEYS[1], 'data', ARGV[2], 'status', ARGV[3], 'progress', ARGV[4])
if ARGV[5] == 'push' then
  redis.call('RPUSH', KEYS[2], ARGV[6])
elseif ARGV[5] == 'remove' then
  redis.call('LREM', KEYS[2], 0, ARGV[6])
end
if tonumber(ARGV[7]) > 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[7])
end
return {'ok', ''}
"#;

/// Redis-backed store.
///
/// Every failure to reach Redis surfaces as `StoreUnavailable`; once this
/// variant is selected there is no falling back to the in-memory store, so
/// two processes can never drift apart on where the jobs live.
pub struct RedisStore {
    client: redis::Client,
    key_prefix: String,
    job_ttl: Option<Duration>,
    transition: redis::Script,
}

impl RedisStore {
    /// Create a Redis store from configuration. Connections are established
    /// lazily per operation.
    pub fn new(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            key_prefix: config.key_prefix.clone(),
            job_ttl: config.job_ttl,
            transition: redis::Script::new(TRANSITION_SCRIPT),
        })
    }

    async fn connection(&self) -> QueueResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn job_key(&self, job_id: &JobId) -> String {
        format!("{}:job:{}", self.key_prefix, job_id)
    }

    fn queue_key(&self) -> String {
        format!("{}:queue", self.key_prefix)
    }

    fn ttl_secs(&self) -> u64 {
        self.job_ttl.map(|ttl| ttl.as_secs()).unwrap_or(0)
    }

    fn decode(json: &str) -> QueueResult<Job> {
        Ok(Job::from_snapshot(&JobSnapshot::from_json(json)?)?)
    }

    /// Fetch the current record, compute the transition in Rust, then write
    /// it back through the script, which re-checks the status it was
    /// computed from. A record whose status moved in between makes the
    /// script report the actual state instead of writing, so the loser of a
    /// race observes `InvalidTransition` and never clobbers the winner.
    async fn apply<F>(&self, job_id: &JobId, transition: F) -> QueueResult<Job>
    where
        F: FnOnce(Job) -> Result<Job, InvalidTransition>,
    {
        let mut conn = self.connection().await?;

        let data: Option<String> = conn.hget(self.job_key(job_id), "data").await?;
        let json = data.ok_or_else(|| QueueError::not_found(job_id))?;
        let current = Self::decode(&json)?;
        let expected = current.status;
        let was_queued = expected == JobStatus::Queued;

        let updated = transition(current)?;

        let queue_op = if !was_queued && updated.status == JobStatus::Queued {
            "push"
        } else if was_queued && updated.status != JobStatus::Queued {
            "remove"
        } else {
            "none"
        };

        let snapshot_json = updated.to_snapshot().to_json()?;
        let (verdict, payload): (String, String) = self
            .transition
            .key(self.job_key(job_id))
            .key(self.queue_key())
            .arg(expected.as_str())
            .arg(&snapshot_json)
            .arg(updated.status.as_str())
            .arg(i64::from(updated.progress))
            .arg(queue_op)
            .arg(job_id.as_str())
            .arg(self.ttl_secs())
            .invoke_async(&mut conn)
            .await?;

        match verdict.as_str() {
            "ok" => Ok(updated),
            // A later progress value won the race; hand back the stored
            // record rather than regressing it.
            "stale" => Self::decode(&payload),
            "conflict" => {
                let from = payload
                    .parse::<JobStatus>()
                    .map_err(SnapshotError::from)?;
                debug!(job_id = %job_id, from = %from, to = %updated.status, "transition lost race");
                Err(InvalidTransition {
                    from,
                    to: updated.status,
                }
                .into())
            }
            // Record expired between the fetch and the script run.
            _ => Err(QueueError::not_found(job_id)),
        }
    }
}

#[async_trait]
impl JobStore for RedisStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Redis
    }

    async fn insert(&self, job: &Job) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let key = self.job_key(&job.job_id);
        let snapshot_json = job.to_snapshot().to_json()?;
        let progress = job.progress.to_string();

        conn.hset_multiple::<_, _, _, ()>(
            &key,
            &[
                ("data", snapshot_json.as_str()),
                ("status", job.status.as_str()),
                ("progress", progress.as_str()),
            ],
        )
        .await?;

        if let Some(ttl) = self.job_ttl {
            conn.expire::<_, ()>(&key, ttl.as_secs() as i64).await?;
        }

        Ok(())
    }

    async fn fetch(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        let mut conn = self.connection().await?;
        let data: Option<String> = conn.hget(self.job_key(job_id), "data").await?;
        match data {
            Some(json) => Ok(Some(Self::decode(&json)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> QueueResult<Vec<Job>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}:job:*", self.key_prefix);
        let keys: Vec<String> = conn.keys(&pattern).await?;

        let mut jobs = Vec::with_capacity(keys.len());
        for key in keys {
            // A key may expire between KEYS and HGET; skip it.
            let data: Option<String> = conn.hget(&key, "data").await?;
            if let Some(json) = data {
                jobs.push(Self::decode(&json)?);
            }
        }
        Ok(jobs)
    }

    async fn queued_ids(&self) -> QueueResult<Vec<JobId>> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn.lrange(self.queue_key(), 0, -1).await?;
        Ok(ids.into_iter().map(JobId::from_string).collect())
    }

    async fn queue_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        Ok(conn.llen(self.queue_key()).await?)
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
