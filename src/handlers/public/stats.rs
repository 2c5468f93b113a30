use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::AnonVisit;

/// GET /api/stats/get
///
/// Merges a visit count with the singleton stats row. An absent stats row
/// yields zeros; partial data is never returned.
pub async fn stats_get(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let visits = state.store.count_visits().await?;
    let stats = state.store.stats_row().await?.unwrap_or_default();

    Ok(Json(json!({
        "visits": visits,
        "betaSignups": stats.beta_signups,
        "notifySignups": stats.notify_signups,
    })))
}

/// POST /api/stats/increment-beta
pub async fn increment_beta(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .store
        .increment_stat("beta_signups")
        .await
        .map_err(|e| {
            tracing::error!("beta signup increment failed: {}", e);
            ApiError::storage("Failed to increment")
        })?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct VisitQuery {
    path: Option<String>,
}

/// POST /api/stats/increment-visits
///
/// Records an anonymous visit. Requests carrying a valid session token are
/// skipped so authenticated traffic never lands in `anon_visits`.
pub async fn increment_visits(
    State(state): State<AppState>,
    Query(query): Query<VisitQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    if let Some(token) = bearer_token(&headers) {
        if state.auth.verify(token).await.is_ok() {
            return Ok(Json(json!({ "success": false, "reason": "authenticated" })));
        }
    }

    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
        .to_string();
    let ua = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let path = query.path.unwrap_or_else(|| "unknown".to_string());

    state
        .store
        .insert_anon_visit(&AnonVisit {
            ip,
            ua,
            path,
            occurred_at: Utc::now(),
        })
        .await?;

    Ok(Json(json!({ "success": true })))
}
