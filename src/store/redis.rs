use super::{ScriptedOutcome, WindowStore};
use crate::error::Result;
use crate::rate_limit::lua::CHECK_AND_RECORD_SCRIPT;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Script};
use tracing::debug;

/// Redis-backed window store using one sorted set per rate-limit key.
///
/// Entries: score = member = accepted-request timestamp in milliseconds.
/// The multi-operation write runs as a MULTI/EXEC pipeline so no other
/// client observes a partially applied update.
pub struct RedisWindowStore {
    connection: ConnectionManager,
}

impl RedisWindowStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Open a client and establish a managed connection
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn count_from(&self, key: &str, min_score: i64) -> Result<u64> {
        let mut conn = self.connection.clone();
        let count: u64 = redis::cmd("ZCOUNT")
            .arg(key)
            .arg(min_score)
            .arg("+inf")
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn oldest_score(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.connection.clone();
        let entries: Vec<(String, i64)> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(0)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;
        Ok(entries.first().map(|(_, score)| *score))
    }

    async fn record(
        &self,
        key: &str,
        timestamp_ms: i64,
        trim_below: i64,
        ttl_secs: u64,
    ) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(key)
            .arg(timestamp_ms)
            .arg(timestamp_ms)
            .ignore()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(0)
            .arg(format!("({}", trim_below))
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!("Recorded window entry for key {} at {}", key, timestamp_ms);
        Ok(())
    }

    async fn check_and_record(
        &self,
        key: &str,
        timestamp_ms: i64,
        window_ms: u64,
        max_requests: u32,
    ) -> Result<ScriptedOutcome> {
        let mut conn = self.connection.clone();
        let script = Script::new(CHECK_AND_RECORD_SCRIPT);

        let result: Vec<i64> = script
            .key(key)
            .arg(max_requests)
            .arg(window_ms)
            .arg(timestamp_ms)
            .invoke_async(&mut conn)
            .await?;

        let admitted = result.first().copied().unwrap_or(0) == 1;
        let count = result.get(1).copied().unwrap_or(0).max(0) as u64;
        let oldest = match result.get(2).copied() {
            Some(score) if score >= 0 => Some(score),
            _ => None,
        };

        Ok(ScriptedOutcome {
            admitted,
            count,
            oldest,
        })
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
