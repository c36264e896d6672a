use crate::rate_limit::types::RateLimitQuota;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted, time-boxed quota override for one API path.
///
/// `expires_at` is an exclusive upper bound: the override is active for
/// instants in `[starts_at, expires_at)`. Expired rows are never purged
/// by this subsystem; they are only excluded from active queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOverride {
    pub id: Uuid,
    /// API path, either literal or a wildcard pattern such as `/api/users/*`
    pub path: String,
    pub window_ms: u64,
    pub max_requests: u32,
    pub authenticated_max_requests: u32,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RateLimitOverride {
    /// Whether the override is in force at `instant`
    pub fn is_active_at(&self, instant: DateTime<Utc>) -> bool {
        self.starts_at <= instant && instant < self.expires_at
    }

    /// Closed-open interval intersection: touching intervals do not
    /// overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.expires_at && end > self.starts_at
    }

    /// The quota this override imposes
    pub fn quota(&self) -> RateLimitQuota {
        RateLimitQuota {
            window_ms: self.window_ms,
            max_requests: self.max_requests,
            authenticated_max_requests: Some(self.authenticated_max_requests),
        }
    }
}
