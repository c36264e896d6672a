use super::types::{RateLimitOptions, RateLimitQuota};
use crate::error::Result;
use crate::overrides::OverrideService;
use std::sync::Arc;
use tracing::debug;

/// Determines the effective quota for a request.
///
/// Precedence, first match wins:
/// 1. an active persisted override whose path matches the request path
///    (exact or wildcard pattern),
/// 2. a static per-path entry from configuration (exact path),
/// 3. the static default.
///
/// The authenticated/anonymous ceiling is selected later, against
/// whichever quota this resolver returns.
pub struct QuotaResolver {
    options: RateLimitOptions,
    overrides: Arc<OverrideService>,
}

impl QuotaResolver {
    pub fn new(options: RateLimitOptions, overrides: Arc<OverrideService>) -> Self {
        Self { options, overrides }
    }

    pub async fn resolve(&self, path: &str) -> Result<RateLimitQuota> {
        if let Some(active) = self.overrides.find_active_match(path).await? {
            debug!(
                "Using persisted override {} for path {}",
                active.path, path
            );
            return Ok(active.quota());
        }

        if let Some(quota) = self.options.overrides.get(path) {
            debug!("Using static override for path {}", path);
            return Ok(quota.clone());
        }

        Ok(self.options.default.clone())
    }
}
