//! Sliding-window rate limiting.
//!
//! The admission engine counts the requests a subject has made inside a
//! trailing window and rejects the request that would exceed the
//! effective quota. Quotas come from the resolver: an active persisted
//! override, a static per-path override, or the configured default,
//! with a separate ceiling for authenticated callers.
//!
//! Two admission strategies are available:
//!
//! - **counted** (default): a count read followed by a separate atomic
//!   add/trim/expire write
//! - **scripted**: one server-side script performing the whole
//!   check-and-record atomically, same header values
//!
//! # Example
//!
//! ```rust,no_run
//! use quotagate::clock::SystemClock;
//! use quotagate::rate_limit::{AdmissionEngine, AdmissionStrategy, RateLimitQuota};
//! use quotagate::store::InMemoryWindowStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = AdmissionEngine::new(
//!         Arc::new(InMemoryWindowStore::new()),
//!         Arc::new(SystemClock),
//!         AdmissionStrategy::Counted,
//!     );
//!
//!     let quota = RateLimitQuota {
//!         window_ms: 60_000,
//!         max_requests: 100,
//!         authenticated_max_requests: Some(200),
//!     };
//!
//!     match engine.admit("ratelimit:ip:203.0.113.9:/api", &quota, false).await {
//!         Ok(decision) => println!("admitted, {} remaining", decision.remaining),
//!         Err(e) => println!("rejected: {}", e),
//!     }
//! }
//! ```

pub mod engine;
pub mod lua;
pub mod middleware;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use engine::AdmissionEngine;
pub use middleware::{apply_rate_limit_headers, rate_limit_middleware, RateLimitState};
pub use resolver::QuotaResolver;
pub use types::{
    store_key, AdmissionStrategy, RateLimitDecision, RateLimitOptions, RateLimitQuota,
};
