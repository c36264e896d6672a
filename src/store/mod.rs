//! Shared ordered-set window store.
//!
//! Accepted requests are recorded as timestamped entries in a named
//! ordered set, one set per rate-limit key. All process instances
//! coordinate through the same store; the client is constructed
//! explicitly and injected, never a process-wide singleton.

pub mod memory;
pub mod redis;

use crate::error::Result;
use async_trait::async_trait;

pub use self::memory::InMemoryWindowStore;
pub use self::redis::RedisWindowStore;

/// Result of the atomic check-and-record script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedOutcome {
    pub admitted: bool,
    /// Entries inside the window before the current request was added
    pub count: u64,
    /// Score of the oldest surviving entry, if any
    pub oldest: Option<i64>,
}

/// Ordered set of timestamped entries with expiry, keyed by rate-limit
/// scope. Scores are integer milliseconds since epoch.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Number of entries with score in `[min_score, +inf)`
    async fn count_from(&self, key: &str, min_score: i64) -> Result<u64>;

    /// Score of the oldest entry under `key`
    async fn oldest_score(&self, key: &str) -> Result<Option<i64>>;

    /// Atomically: add an entry scored `timestamp_ms`, remove entries
    /// with score in `[0, trim_below)`, and refresh the key TTL.
    async fn record(
        &self,
        key: &str,
        timestamp_ms: i64,
        trim_below: i64,
        ttl_secs: u64,
    ) -> Result<()>;

    /// Atomic trim + count + conditional add + expire, performed as one
    /// store-side operation. Used by the scripted admission strategy.
    async fn check_and_record(
        &self,
        key: &str,
        timestamp_ms: i64,
        window_ms: u64,
        max_requests: u32,
    ) -> Result<ScriptedOutcome>;

    /// Liveness probe
    async fn ping(&self) -> Result<()>;
}
