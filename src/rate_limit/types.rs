use crate::identity::Subject;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Effective quota for one request: how many requests fit in a trailing
/// window of `window_ms` milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitQuota {
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Maximum requests allowed inside the window
    pub max_requests: u32,
    /// Higher ceiling applied to authenticated callers, when present
    #[serde(default)]
    pub authenticated_max_requests: Option<u32>,
}

impl RateLimitQuota {
    /// Ceiling that applies to this caller
    pub fn effective_max(&self, authenticated: bool) -> u32 {
        if authenticated {
            self.authenticated_max_requests.unwrap_or(self.max_requests)
        } else {
            self.max_requests
        }
    }

    /// Key TTL refreshed on every admit, so idle keys self-expire
    pub fn ttl_secs(&self) -> u64 {
        self.window_ms.div_ceil(1000)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.window_ms == 0 {
            return Err(crate::error::QuotagateError::Validation(
                "window_ms must be positive".to_string(),
            ));
        }
        if self.max_requests == 0 {
            return Err(crate::error::QuotagateError::Validation(
                "max_requests must be positive".to_string(),
            ));
        }
        if self.authenticated_max_requests == Some(0) {
            return Err(crate::error::QuotagateError::Validation(
                "authenticated_max_requests must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// How the admission check talks to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionStrategy {
    /// A COUNT read followed by a separate atomic add/trim/expire
    /// write. Concurrent bursts can transiently over-admit between the
    /// two steps.
    #[default]
    Counted,
    /// Hardened behavior: one server-side script performs trim, count,
    /// conditional add, and expire atomically.
    Scripted,
}

/// Process-wide rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitOptions {
    /// Quota applied when no override matches
    #[serde(default = "default_quota")]
    pub default: RateLimitQuota,
    /// Static per-path quota overrides (exact path match)
    #[serde(default)]
    pub overrides: HashMap<String, RateLimitQuota>,
    /// Namespace prefix for store keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// One counter per subject across all paths (true) vs one counter
    /// per subject-per-path (false)
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub strategy: AdmissionStrategy,
}

fn default_quota() -> RateLimitQuota {
    // 100 requests per hour
    RateLimitQuota {
        window_ms: 60 * 60 * 1000,
        max_requests: 100,
        authenticated_max_requests: None,
    }
}

fn default_key_prefix() -> String {
    "ratelimit".to_string()
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            default: default_quota(),
            overrides: HashMap::new(),
            key_prefix: default_key_prefix(),
            global: false,
            strategy: AdmissionStrategy::default(),
        }
    }
}

impl RateLimitOptions {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.key_prefix.is_empty() {
            return Err(crate::error::QuotagateError::Validation(
                "key_prefix must not be empty".to_string(),
            ));
        }
        self.default.validate()?;
        for (path, quota) in &self.overrides {
            if path.is_empty() {
                return Err(crate::error::QuotagateError::Validation(
                    "override path must not be empty".to_string(),
                ));
            }
            quota.validate()?;
        }
        Ok(())
    }
}

/// Build the store key a request is tallied under.
///
/// `{prefix}:user:{id}` / `{prefix}:ip:{addr}` in global mode, with
/// `:{path}` appended in per-path mode.
pub fn store_key(prefix: &str, subject: &Subject, path: &str, global: bool) -> String {
    if global {
        format!("{}:{}", prefix, subject.key_segment())
    } else {
        format!("{}:{}:{}", prefix, subject.key_segment(), path)
    }
}

/// Outcome of an admitted request, rendered into `X-RateLimit-*` headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit: u32,
    /// Requests left, computed from the pre-increment count
    pub remaining: u32,
    /// Unix timestamp (seconds, rounded up) when a full quota is back
    pub reset_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_per_path() {
        let subject = Subject::User("123".to_string());
        assert_eq!(
            store_key("ratelimit", &subject, "/api/users", false),
            "ratelimit:user:123:/api/users"
        );

        let subject = Subject::Ip("192.168.1.100".to_string());
        assert_eq!(
            store_key("ratelimit", &subject, "/api/users", false),
            "ratelimit:ip:192.168.1.100:/api/users"
        );
    }

    #[test]
    fn test_store_key_global() {
        let subject = Subject::User("123".to_string());
        assert_eq!(store_key("ratelimit", &subject, "/api/users", true), "ratelimit:user:123");
    }

    #[test]
    fn test_effective_max() {
        let quota = RateLimitQuota {
            window_ms: 60_000,
            max_requests: 10,
            authenticated_max_requests: Some(20),
        };
        assert_eq!(quota.effective_max(false), 10);
        assert_eq!(quota.effective_max(true), 20);

        let quota = RateLimitQuota {
            window_ms: 60_000,
            max_requests: 10,
            authenticated_max_requests: None,
        };
        assert_eq!(quota.effective_max(true), 10);
    }

    #[test]
    fn test_ttl_rounds_up() {
        let quota = RateLimitQuota {
            window_ms: 1_500,
            max_requests: 1,
            authenticated_max_requests: None,
        };
        assert_eq!(quota.ttl_secs(), 2);

        let quota = RateLimitQuota {
            window_ms: 60_000,
            max_requests: 1,
            authenticated_max_requests: None,
        };
        assert_eq!(quota.ttl_secs(), 60);
    }

    #[test]
    fn test_quota_validation() {
        let quota = RateLimitQuota {
            window_ms: 0,
            max_requests: 10,
            authenticated_max_requests: None,
        };
        assert!(quota.validate().is_err());

        let quota = RateLimitQuota {
            window_ms: 60_000,
            max_requests: 0,
            authenticated_max_requests: None,
        };
        assert!(quota.validate().is_err());

        let quota = RateLimitQuota {
            window_ms: 60_000,
            max_requests: 10,
            authenticated_max_requests: Some(0),
        };
        assert!(quota.validate().is_err());
    }

    #[test]
    fn test_options_defaults() {
        let options = RateLimitOptions::default();
        assert_eq!(options.key_prefix, "ratelimit");
        assert_eq!(options.default.max_requests, 100);
        assert_eq!(options.default.window_ms, 3_600_000);
        assert!(!options.global);
        assert_eq!(options.strategy, AdmissionStrategy::Counted);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_strategy_deserializes_lowercase() {
        let strategy: AdmissionStrategy = serde_yaml::from_str("scripted").unwrap();
        assert_eq!(strategy, AdmissionStrategy::Scripted);
    }
}
