use super::model::RateLimitOverride;
use crate::error::{QuotagateError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use uuid::Uuid;

/// Query filter for override lookups. All present conditions must hold.
#[derive(Debug, Clone, Default)]
pub struct OverrideFilter {
    /// Exact path match
    pub path: Option<String>,
    /// Path in the given set
    pub paths: Option<Vec<String>>,
    /// Creator subject id
    pub created_by: Option<String>,
    /// Interval overlap (closed-open) with the given range
    pub overlapping: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Interval contains the given instant
    pub active_at: Option<DateTime<Utc>>,
    /// Truncate to at most this many rows, applied after sorting
    pub limit: Option<usize>,
    /// Sort by creation time descending instead of ascending
    pub newest_first: bool,
}

impl OverrideFilter {
    pub fn matches(&self, row: &RateLimitOverride) -> bool {
        if let Some(path) = &self.path {
            if &row.path != path {
                return false;
            }
        }
        if let Some(paths) = &self.paths {
            if !paths.iter().any(|p| p == &row.path) {
                return false;
            }
        }
        if let Some(created_by) = &self.created_by {
            if row.created_by.as_deref() != Some(created_by.as_str()) {
                return false;
            }
        }
        if let Some((start, end)) = self.overlapping {
            if !row.overlaps(start, end) {
                return false;
            }
        }
        if let Some(instant) = self.active_at {
            if !row.is_active_at(instant) {
                return false;
            }
        }
        true
    }

    /// Filter, sort, and truncate a row set
    pub fn apply(&self, mut rows: Vec<RateLimitOverride>) -> Vec<RateLimitOverride> {
        rows.retain(|row| self.matches(row));
        rows.sort_by_key(|row| (row.created_at, row.id));
        if self.newest_first {
            rows.reverse();
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// Persistence seam for quota overrides
#[async_trait]
pub trait OverrideRepository: Send + Sync {
    async fn insert(&self, row: RateLimitOverride) -> Result<RateLimitOverride>;

    async fn find(&self, filter: &OverrideFilter) -> Result<Vec<RateLimitOverride>>;

    /// Delete all rows matching the filter, returning how many were removed
    async fn delete(&self, filter: &OverrideFilter) -> Result<u64>;
}

/// Redis-backed repository: rows live as JSON fields of one hash,
/// keyed by override id. Override cardinality is small (an admin
/// creates them by hand), so filtering happens client-side.
pub struct RedisOverrideRepository {
    connection: ConnectionManager,
    hash_key: String,
}

impl RedisOverrideRepository {
    pub fn new(connection: ConnectionManager, hash_key: impl Into<String>) -> Self {
        Self {
            connection,
            hash_key: hash_key.into(),
        }
    }

    async fn load_all(&self) -> Result<Vec<RateLimitOverride>> {
        let mut conn = self.connection.clone();
        let rows: Vec<(String, String)> = redis::cmd("HGETALL")
            .arg(&self.hash_key)
            .query_async(&mut conn)
            .await?;

        rows.into_iter()
            .map(|(_, json)| {
                serde_json::from_str(&json).map_err(|e| {
                    QuotagateError::Internal(format!("Failed to decode override row: {}", e))
                })
            })
            .collect()
    }
}

#[async_trait]
impl OverrideRepository for RedisOverrideRepository {
    async fn insert(&self, row: RateLimitOverride) -> Result<RateLimitOverride> {
        let json = serde_json::to_string(&row)
            .map_err(|e| QuotagateError::Internal(format!("Failed to encode override: {}", e)))?;

        let mut conn = self.connection.clone();
        redis::cmd("HSET")
            .arg(&self.hash_key)
            .arg(row.id.to_string())
            .arg(json)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(row)
    }

    async fn find(&self, filter: &OverrideFilter) -> Result<Vec<RateLimitOverride>> {
        Ok(filter.apply(self.load_all().await?))
    }

    async fn delete(&self, filter: &OverrideFilter) -> Result<u64> {
        let matched = filter.apply(self.load_all().await?);
        if matched.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(&self.hash_key);
        for row in &matched {
            cmd.arg(row.id.to_string());
        }
        let removed: u64 = cmd.query_async(&mut conn).await?;
        Ok(removed)
    }
}

/// In-memory repository for tests and single-process deployments
#[derive(Default)]
pub struct InMemoryOverrideRepository {
    rows: DashMap<Uuid, RateLimitOverride>,
}

impl InMemoryOverrideRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OverrideRepository for InMemoryOverrideRepository {
    async fn insert(&self, row: RateLimitOverride) -> Result<RateLimitOverride> {
        self.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find(&self, filter: &OverrideFilter) -> Result<Vec<RateLimitOverride>> {
        let rows: Vec<_> = self.rows.iter().map(|entry| entry.value().clone()).collect();
        Ok(filter.apply(rows))
    }

    async fn delete(&self, filter: &OverrideFilter) -> Result<u64> {
        let matched = filter.apply(
            self.rows.iter().map(|entry| entry.value().clone()).collect(),
        );
        for row in &matched {
            self.rows.remove(&row.id);
        }
        Ok(matched.len() as u64)
    }
}
