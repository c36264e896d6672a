//! Temporary, time-boxed quota overrides.
//!
//! Administrators can replace the quota for an API path during a
//! `[starts_at, expires_at)` window. Overrides are persisted so every
//! process instance sees the same set; the service layer guarantees
//! that no two overrides for the same path have overlapping intervals.

pub mod model;
pub mod repository;
pub mod service;

pub use model::RateLimitOverride;
pub use repository::{
    InMemoryOverrideRepository, OverrideFilter, OverrideRepository, RedisOverrideRepository,
};
pub use service::{OverrideService, RemoveOptions};
