use super::model::RateLimitOverride;
use super::repository::{OverrideFilter, OverrideRepository};
use crate::error::{QuotagateError, Result};
use crate::rate_limit::types::RateLimitQuota;
use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use regex::Regex;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Optional constraints for override removal
#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    pub created_by: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Owns the override collection and its invariants. No other component
/// writes overrides.
pub struct OverrideService {
    repository: Arc<dyn OverrideRepository>,
}

impl OverrideService {
    pub fn new(repository: Arc<dyn OverrideRepository>) -> Self {
        Self { repository }
    }

    /// Create a time-boxed override spanning `duration_hours` from
    /// `starts_at`. Fails with Conflict if any existing override for
    /// the path has an overlapping interval; the existing override is
    /// left untouched, never merged or replaced.
    pub async fn create_override_window(
        &self,
        path: &str,
        quota: RateLimitQuota,
        starts_at: DateTime<Utc>,
        duration_hours: u32,
        created_by: Option<String>,
    ) -> Result<RateLimitOverride> {
        if path.trim().is_empty() {
            return Err(QuotagateError::Validation(
                "Path is required and cannot be empty".to_string(),
            ));
        }
        if duration_hours == 0 {
            return Err(QuotagateError::Validation(
                "Duration must be positive".to_string(),
            ));
        }
        quota.validate()?;

        let expires_at = starts_at + Duration::hours(duration_hours as i64);

        if self
            .has_overlapping_override(path, starts_at, expires_at)
            .await?
        {
            return Err(QuotagateError::Conflict(
                "Time window overlaps with existing rate limit override".to_string(),
            ));
        }

        let now = Utc::now();
        let row = RateLimitOverride {
            id: Uuid::new_v4(),
            path: path.to_string(),
            window_ms: quota.window_ms,
            max_requests: quota.max_requests,
            authenticated_max_requests: quota
                .authenticated_max_requests
                .unwrap_or(quota.max_requests),
            starts_at,
            expires_at,
            created_by,
            created_at: now,
            updated_at: now,
        };

        info!(
            "Created rate limit override for {} from {} to {}",
            row.path, row.starts_at, row.expires_at
        );

        self.repository.insert(row).await
    }

    /// Remove overrides for the given paths, constrained by the
    /// options. With a date range, only paths that currently have at
    /// least one overlapping override are deleted from; paths with no
    /// overlap are silently skipped. Returns the number removed; zero
    /// matches is not an error.
    pub async fn remove_temporary_override(
        &self,
        paths: &[String],
        options: RemoveOptions,
    ) -> Result<u64> {
        let mut target_paths: Vec<String> = paths.to_vec();

        if let (Some(start), Some(end)) = (options.start_date, options.end_date) {
            let overlap_checks = paths
                .iter()
                .map(|path| self.has_overlapping_override(path, start, end));
            let overlaps = try_join_all(overlap_checks).await?;

            target_paths = paths
                .iter()
                .zip(overlaps)
                .filter(|(_, overlapping)| *overlapping)
                .map(|(path, _)| path.clone())
                .collect();

            if target_paths.is_empty() {
                return Ok(0);
            }
        }

        let filter = OverrideFilter {
            paths: Some(target_paths),
            created_by: options.created_by,
            ..Default::default()
        };
        let removed = self.repository.delete(&filter).await?;

        if removed > 0 {
            info!("Removed {} rate limit override(s)", removed);
        }
        Ok(removed)
    }

    /// Most recent 100 overrides, newest first, optionally filtered by
    /// exact path
    pub async fn get_recent_overrides(
        &self,
        path: Option<&str>,
    ) -> Result<Vec<RateLimitOverride>> {
        self.repository
            .find(&OverrideFilter {
                path: path.map(|p| p.to_string()),
                limit: Some(100),
                newest_first: true,
                ..Default::default()
            })
            .await
    }

    /// Overrides whose interval contains the current instant
    pub async fn get_active_path_overrides(
        &self,
        path: Option<&str>,
    ) -> Result<Vec<RateLimitOverride>> {
        self.repository
            .find(&OverrideFilter {
                path: path.map(|p| p.to_string()),
                active_at: Some(Utc::now()),
                ..Default::default()
            })
            .await
    }

    /// The active override governing `request_path`, if any.
    ///
    /// An override matches when its stored path equals the request path
    /// or, treated as a wildcard pattern, matches it. Exact matches are
    /// preferred over pattern matches; within a class the earliest
    /// created override wins, so the result does not depend on store
    /// iteration order.
    pub async fn find_active_match(
        &self,
        request_path: &str,
    ) -> Result<Option<RateLimitOverride>> {
        let active = self
            .repository
            .find(&OverrideFilter {
                active_at: Some(Utc::now()),
                ..Default::default()
            })
            .await?;

        if let Some(exact) = active
            .iter()
            .filter(|row| row.path == request_path)
            .min_by_key(|row| (row.created_at, row.id))
        {
            return Ok(Some(exact.clone()));
        }

        Ok(active
            .iter()
            .filter(|row| path_pattern_matches(&row.path, request_path))
            .min_by_key(|row| (row.created_at, row.id))
            .cloned())
    }

    async fn has_overlapping_override(
        &self,
        path: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool> {
        let overlapping = self
            .repository
            .find(&OverrideFilter {
                path: Some(path.to_string()),
                overlapping: Some((start, end)),
                ..Default::default()
            })
            .await?;
        Ok(!overlapping.is_empty())
    }
}

/// Whether a stored override path, read as a wildcard pattern, matches
/// a request path. `*` matches any run of characters; every other
/// character is literal, e.g. `/api/compliments/*` matches
/// `/api/compliments/random`.
pub fn path_pattern_matches(pattern: &str, path: &str) -> bool {
    let escaped = regex::escape(pattern).replace("\\*", ".*");
    match Regex::new(&format!("^{}$", escaped)) {
        Ok(re) => re.is_match(path),
        Err(_) => false,
    }
}
