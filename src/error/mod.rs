use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Result type for quotagate operations
pub type Result<T> = std::result::Result<T, QuotagateError>;

/// Quotagate error types
#[derive(Error, Debug)]
pub enum QuotagateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimitExceeded {
        /// Seconds the client must wait before the oldest window entry expires
        retry_after_secs: u64,
        limit: u32,
        remaining: u32,
        /// Unix timestamp (seconds, rounded up) when the window resets
        reset_secs: u64,
    },

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Missing authentication credentials")]
    MissingCredentials,

    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl QuotagateError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            QuotagateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QuotagateError::Validation(_) => StatusCode::BAD_REQUEST,
            QuotagateError::Conflict(_) => StatusCode::CONFLICT,
            QuotagateError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            QuotagateError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            QuotagateError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            QuotagateError::MissingCredentials => StatusCode::UNAUTHORIZED,
            QuotagateError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QuotagateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QuotagateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for QuotagateError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            QuotagateError::RateLimitExceeded {
                retry_after_secs,
                limit,
                remaining,
                reset_secs,
            } => {
                let mut headers = HeaderMap::new();
                headers.insert(
                    "X-RateLimit-Limit",
                    HeaderValue::from_str(&limit.to_string()).unwrap(),
                );
                headers.insert(
                    "X-RateLimit-Remaining",
                    HeaderValue::from_str(&remaining.to_string()).unwrap(),
                );
                headers.insert(
                    "X-RateLimit-Reset",
                    HeaderValue::from_str(&reset_secs.to_string()).unwrap(),
                );
                headers.insert(
                    "Retry-After",
                    HeaderValue::from_str(&retry_after_secs.to_string()).unwrap(),
                );

                let body = Json(json!({
                    "error": "Too Many Requests",
                    "status": status.as_u16(),
                    "retryAfter": retry_after_secs,
                }));

                (status, headers, body).into_response()
            }
            // Store and internal failures are reported opaquely; the detail goes
            // to the log, never to the client.
            QuotagateError::Config(_)
            | QuotagateError::Store(_)
            | QuotagateError::Io(_)
            | QuotagateError::Internal(_) => {
                error!("Internal error: {}", self);
                let body = Json(json!({
                    "error": "Internal Server Error",
                    "status": status.as_u16(),
                }));
                (status, body).into_response()
            }
            _ => {
                let body = Json(json!({
                    "error": self.to_string(),
                    "status": status.as_u16(),
                }));
                (status, body).into_response()
            }
        }
    }
}
