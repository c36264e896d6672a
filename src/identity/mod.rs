//! Per-request subject resolution.
//!
//! Every request is tallied under a stable subject: the verified user id
//! when a bearer token checks out, otherwise the client IP. Token
//! verification failures are swallowed here; this resolver never raises,
//! it degrades to IP-based identity.

use crate::auth::JwtValidator;
use axum::http::HeaderMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Who a request is attributed to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// Verified user id from a bearer token
    User(String),
    /// Client IP address
    Ip(String),
}

impl Subject {
    /// Store-key segment: `user:{id}` or `ip:{addr}`
    pub fn key_segment(&self) -> String {
        match self {
            Subject::User(id) => format!("user:{}", id),
            Subject::Ip(addr) => format!("ip:{}", addr),
        }
    }
}

/// Resolved identity, computed once per request and carried in request
/// extensions so no component verifies the token twice.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub subject: Subject,
    pub is_authenticated: bool,
}

impl RequestIdentity {
    /// Subject id when the caller is authenticated
    pub fn user_id(&self) -> Option<&str> {
        match (&self.subject, self.is_authenticated) {
            (Subject::User(id), true) => Some(id),
            _ => None,
        }
    }
}

/// Resolves request identities against an optional token validator
pub struct IdentityResolver {
    validator: Option<Arc<JwtValidator>>,
}

impl IdentityResolver {
    pub fn new(validator: Option<Arc<JwtValidator>>) -> Self {
        Self { validator }
    }

    /// Resolve the subject for a request. Never fails: verification
    /// errors fall back to the client IP.
    pub fn resolve(&self, headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> RequestIdentity {
        if let Some(validator) = &self.validator {
            match validator.verify(headers) {
                Ok(claims) => {
                    return RequestIdentity {
                        subject: Subject::User(claims.sub),
                        is_authenticated: true,
                    };
                }
                Err(e) => {
                    debug!("Token verification failed, falling back to IP: {}", e);
                }
            }
        }

        RequestIdentity {
            subject: Subject::Ip(client_ip(headers, remote_addr)),
            is_authenticated: false,
        }
    }
}

/// First IP found checking `x-real-ip`, then the first entry of
/// `x-forwarded-for`, then the raw connection address.
fn client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
