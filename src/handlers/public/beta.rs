use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::BetaTester;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestAccessBody {
    user_id: Option<Uuid>,
}

/// POST /api/beta/request-access
///
/// Records a pending beta-access request for a user. Rejects a second
/// request for the same user before touching the store again.
pub async fn request_access(
    State(state): State<AppState>,
    Json(body): Json<RequestAccessBody>,
) -> Result<Json<Value>, ApiError> {
    let user_id = body
        .user_id
        .ok_or_else(|| ApiError::validation("Missing userId"))?;

    let user = state
        .store
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    if state.store.beta_request_exists(user.id).await? {
        return Err(ApiError::validation("Request already submitted."));
    }

    state
        .store
        .insert_beta_tester(&BetaTester::pending(&user))
        .await?;

    Ok(Json(json!({ "success": true })))
}

/// GET /api/join-beta/count
pub async fn join_beta_count(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.store.count_join_beta().await?;
    Ok(Json(json!({ "count": count })))
}
