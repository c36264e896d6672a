//! Token verification collaborator.
//!
//! Quotagate never issues or refreshes tokens; it only verifies bearer
//! tokens handed to it and extracts the subject id. Verification errors
//! are surfaced as typed errors here and downgraded to "anonymous" by
//! the identity resolver.

pub mod jwt;

pub use jwt::{Claims, JwtValidator};
