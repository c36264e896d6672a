//! Liveness probe backed by a store ping.

use crate::store::WindowStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    pub store: Arc<dyn WindowStore>,
}

pub fn router(store: Arc<dyn WindowStore>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(HealthState { store })
}

async fn health_check(State(state): State<HealthState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}
