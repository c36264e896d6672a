use super::engine::AdmissionEngine;
use super::resolver::QuotaResolver;
use super::types::{store_key, RateLimitDecision};
use crate::identity::IdentityResolver;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared state for the rate limiting layer
#[derive(Clone)]
pub struct RateLimitState {
    pub engine: Arc<AdmissionEngine>,
    pub quotas: Arc<QuotaResolver>,
    pub identity: Arc<IdentityResolver>,
    pub key_prefix: String,
    pub global: bool,
}

/// Axum middleware applying sliding-window admission control.
///
/// Resolves the request identity once and stashes it in request
/// extensions for downstream handlers, determines the effective quota,
/// and asks the engine for a decision. Admitted requests proceed with
/// `X-RateLimit-*` headers attached to the response; rejected requests
/// short-circuit into a 429 carrying retry timing. Store failures
/// surface as opaque server errors, never as an implicit admit or
/// reject.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut request: Request,
    next: Next,
) -> Response {
    let remote_addr = connect_info.map(|ConnectInfo(addr)| addr);
    let identity = state.identity.resolve(request.headers(), remote_addr);
    let path = request.uri().path().to_string();

    let key = store_key(&state.key_prefix, &identity.subject, &path, state.global);

    let quota = match state.quotas.resolve(&path).await {
        Ok(quota) => quota,
        Err(e) => return e.into_response(),
    };

    match state
        .engine
        .admit(&key, &quota, identity.is_authenticated)
        .await
    {
        Ok(decision) => {
            request.extensions_mut().insert(identity);
            let mut response = next.run(request).await;
            apply_rate_limit_headers(response.headers_mut(), &decision);
            response
        }
        Err(e) => e.into_response(),
    }
}

/// Attach `X-RateLimit-*` headers to an admitted response
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from_str(&decision.limit.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from_str(&decision.remaining.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&decision.reset_secs.to_string()).unwrap(),
    );
}
