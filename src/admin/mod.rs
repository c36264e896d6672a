//! Admin surface for managing temporary quota overrides.
//!
//! Mutating routes require an authenticated caller; the caller's
//! subject id is recorded as the override's creator. Validation happens
//! before any persistence, so a rejected request never leaves a partial
//! write behind.

use crate::error::{QuotagateError, Result};
use crate::identity::RequestIdentity;
use crate::overrides::{OverrideService, RateLimitOverride, RemoveOptions};
use crate::rate_limit::types::RateLimitQuota;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const MS_PER_HOUR: u64 = 60 * 60 * 1000;

#[derive(Clone)]
pub struct AdminState {
    pub overrides: Arc<OverrideService>,
}

/// Admin router, nested by the caller (e.g. under `/admin/rate-limits`)
pub fn router(overrides: Arc<OverrideService>) -> Router {
    Router::new()
        .route(
            "/",
            get(get_recent_overrides)
                .post(create_override)
                .delete(remove_override),
        )
        .route("/active", get(get_active_overrides))
        .with_state(AdminState { overrides })
}

#[derive(Debug, Deserialize)]
pub struct OverrideQuery {
    pub path: Option<String>,
}

async fn get_recent_overrides(
    State(state): State<AdminState>,
    Query(query): Query<OverrideQuery>,
) -> Result<Json<Vec<RateLimitOverride>>> {
    let overrides = state
        .overrides
        .get_recent_overrides(query.path.as_deref())
        .await?;
    Ok(Json(overrides))
}

async fn get_active_overrides(
    State(state): State<AdminState>,
    Query(query): Query<OverrideQuery>,
) -> Result<Json<Vec<RateLimitOverride>>> {
    let overrides = state
        .overrides
        .get_active_path_overrides(query.path.as_deref())
        .await?;
    Ok(Json(overrides))
}

/// Numbers arrive as signed so out-of-range values produce our own
/// validation message instead of a deserializer rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOverrideBody {
    pub path: String,
    pub max_requests: i64,
    pub authenticated_max_requests: i64,
    pub start_date: String,
    pub duration_hours: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOverrideResponse {
    pub success: bool,
    pub message: String,
    pub override_window: RateLimitOverride,
}

async fn create_override(
    State(state): State<AdminState>,
    identity: Option<Extension<RequestIdentity>>,
    Json(body): Json<CreateOverrideBody>,
) -> Result<Json<CreateOverrideResponse>> {
    let created_by = require_user(identity)?;

    if body.path.trim().is_empty() {
        return Err(QuotagateError::Validation(
            "Path is required and cannot be empty".to_string(),
        ));
    }
    let max_requests = positive_u32(body.max_requests, "maxRequests")?;
    let authenticated_max_requests =
        positive_u32(body.authenticated_max_requests, "authenticatedMaxRequests")?;
    if body.duration_hours <= 0 {
        return Err(QuotagateError::Validation(
            "durationHours must be positive".to_string(),
        ));
    }
    let duration_hours = body.duration_hours as u32;
    let starts_at = parse_date(&body.start_date, "startDate")?;

    // The override's window spans its whole duration, so the quota is a
    // budget for the entire override period.
    let quota = RateLimitQuota {
        window_ms: duration_hours as u64 * MS_PER_HOUR,
        max_requests,
        authenticated_max_requests: Some(authenticated_max_requests),
    };

    let row = state
        .overrides
        .create_override_window(&body.path, quota, starts_at, duration_hours, Some(created_by))
        .await?;

    Ok(Json(CreateOverrideResponse {
        success: true,
        message: "Rate limit override configured".to_string(),
        override_window: row,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOverrideBody {
    pub path: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub created_by_active_user: bool,
}

async fn remove_override(
    State(state): State<AdminState>,
    identity: Option<Extension<RequestIdentity>>,
    Json(body): Json<RemoveOverrideBody>,
) -> Result<Json<Value>> {
    let user_id = require_user(identity)?;

    if body.path.trim().is_empty() {
        return Err(QuotagateError::Validation(
            "Path is required and cannot be empty".to_string(),
        ));
    }

    let start_date = body
        .start_date
        .as_deref()
        .map(|s| parse_date(s, "startDate"))
        .transpose()?;
    let end_date = body
        .end_date
        .as_deref()
        .map(|s| parse_date(s, "endDate"))
        .transpose()?;

    let removed = state
        .overrides
        .remove_temporary_override(
            &[body.path],
            RemoveOptions {
                created_by: body.created_by_active_user.then_some(user_id),
                start_date,
                end_date,
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Rate limit override removed",
        "removed": removed,
    })))
}

fn require_user(identity: Option<Extension<RequestIdentity>>) -> Result<String> {
    identity
        .as_ref()
        .and_then(|Extension(identity)| identity.user_id())
        .map(|id| id.to_string())
        .ok_or(QuotagateError::MissingCredentials)
}

fn positive_u32(value: i64, field: &str) -> Result<u32> {
    if value <= 0 || value > u32::MAX as i64 {
        return Err(QuotagateError::Validation(format!(
            "{} must be positive",
            field
        )));
    }
    Ok(value as u32)
}

fn parse_date(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| QuotagateError::Validation(format!("Invalid {} format", field)))
}
