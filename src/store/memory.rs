use super::{ScriptedOutcome, WindowStore};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory window store for tests and single-process deployments.
///
/// Mirrors the ordered-set semantics of the Redis store: entries are
/// sorted by score, trims drop scores strictly below the bound, and the
/// per-key TTL is remembered so tests can assert it was refreshed.
/// Mutations run under the per-key map shard lock, so the multi-step
/// writes are atomic with respect to other callers of the same key.
#[derive(Default)]
pub struct InMemoryWindowStore {
    entries: DashMap<String, Vec<i64>>,
    ttls: DashMap<String, u64>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last TTL set for a key (test hook)
    pub fn ttl_secs(&self, key: &str) -> Option<u64> {
        self.ttls.get(key).map(|t| *t)
    }

    /// Number of entries currently stored under a key (test hook)
    pub fn entry_count(&self, key: &str) -> usize {
        self.entries.get(key).map(|v| v.len()).unwrap_or(0)
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn count_from(&self, key: &str, min_score: i64) -> Result<u64> {
        Ok(self
            .entries
            .get(key)
            .map(|scores| scores.iter().filter(|&&s| s >= min_score).count() as u64)
            .unwrap_or(0))
    }

    async fn oldest_score(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.entries.get(key).and_then(|scores| scores.first().copied()))
    }

    async fn record(
        &self,
        key: &str,
        timestamp_ms: i64,
        trim_below: i64,
        ttl_secs: u64,
    ) -> Result<()> {
        let mut scores = self.entries.entry(key.to_string()).or_default();
        let position = scores.partition_point(|&s| s <= timestamp_ms);
        scores.insert(position, timestamp_ms);
        scores.retain(|&s| s >= trim_below);
        drop(scores);

        self.ttls.insert(key.to_string(), ttl_secs);
        Ok(())
    }

    async fn check_and_record(
        &self,
        key: &str,
        timestamp_ms: i64,
        window_ms: u64,
        max_requests: u32,
    ) -> Result<ScriptedOutcome> {
        let window_start = timestamp_ms - window_ms as i64;

        let mut scores = self.entries.entry(key.to_string()).or_default();
        scores.retain(|&s| s >= window_start);

        let count = scores.len() as u64;
        let admitted = count < max_requests as u64;
        if admitted {
            let position = scores.partition_point(|&s| s <= timestamp_ms);
            scores.insert(position, timestamp_ms);
        }
        let oldest = scores.first().copied();
        drop(scores);

        if admitted {
            self.ttls
                .insert(key.to_string(), window_ms.div_ceil(1000));
        }

        Ok(ScriptedOutcome {
            admitted,
            count,
            oldest,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
