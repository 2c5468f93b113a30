use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{audit, AuditEntry, BetaTester};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantBetaBody {
    user_id: Option<Uuid>,
}

/// POST /api/grant-beta-access (admin)
///
/// Two-step grant: flip the target's role, then upsert the approval record.
/// The writes are independent; a failure after the first leaves the role
/// changed and is surfaced as 500 plus an audit entry, not compensated.
pub async fn grant_beta_access(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(body): Json<GrantBetaBody>,
) -> Result<Json<Value>, ApiError> {
    let user_id = body
        .user_id
        .ok_or_else(|| ApiError::validation("Missing userId"))?;

    let user = state
        .store
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found or error fetching user"))?;

    state.store.set_user_role(user.id, "beta-tester").await?;

    if let Err(e) = state
        .store
        .upsert_beta_tester(&BetaTester::approved(&user))
        .await
    {
        audit(
            state.store.as_ref(),
            AuditEntry::error(
                "beta",
                "Role updated but approval upsert failed",
                json!({
                    "user_id": user.id,
                    "granted_by": admin.id,
                    "error": e.to_string(),
                }),
            ),
        )
        .await;
        return Err(e.into());
    }

    Ok(Json(json!({ "success": true })))
}
