//! Queue configuration.

use std::time::Duration;

use tracing::info;

/// Which persistence variant backs the queue. Fixed once the manager is
/// constructed; there is no failover between variants at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local map and queue, lost on restart
    Memory,
    /// Redis-backed records and queue list
    Redis,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Redis => "redis",
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Store variant
    pub backend: StoreBackend,
    /// Redis URL
    pub redis_url: String,
    /// Prefix for every Redis key this subsystem touches
    pub key_prefix: String,
    /// Expiry the Redis store applies to job records, refreshed on each
    /// write. `None` keeps records forever. The memory store never expires.
    pub job_ttl: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "vidgen".to_string(),
            job_ttl: Some(Duration::from_secs(86400)), // 24 hours
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    ///
    /// `USE_REDIS=true|1` selects the Redis store; anything else, including
    /// an unset variable, selects the in-memory store and says so in the
    /// log, since a silently wrong default here means jobs vanish on
    /// restart.
    pub fn from_env() -> Self {
        let backend = match std::env::var("USE_REDIS") {
            Ok(v) if v == "true" || v == "1" => StoreBackend::Redis,
            Ok(v) => {
                info!("USE_REDIS={} not recognized, using in-memory job store", v);
                StoreBackend::Memory
            }
            Err(_) => {
                info!("USE_REDIS not set, defaulting to in-memory job store");
                StoreBackend::Memory
            }
        };

        let ttl_secs = std::env::var("JOB_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(86400);

        Self {
            backend,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("QUEUE_KEY_PREFIX")
                .unwrap_or_else(|_| "vidgen".to_string()),
            job_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        }
    }
}
