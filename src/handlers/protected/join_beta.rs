use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
pub struct JoinBetaBody {
    name: Option<String>,
    email: Option<String>,
    wallet: Option<String>,
}

/// POST /api/join-beta
///
/// Records a beta signup and bumps the `beta_signups` counter. Duplicate
/// email or wallet surfaces as 409 based on the violated constraint; the
/// store's uniqueness checks are the only concurrency guard here.
pub async fn join_beta(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<JoinBetaBody>,
) -> Result<Json<Value>, ApiError> {
    tracing::debug!("join-beta request from {}", user.email);

    let name = body
        .name
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Missing name"))?;
    let email = body
        .email
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Missing email"))?;
    let wallet = body
        .wallet
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Missing wallet"))?;

    if let Err(e) = state.store.insert_join_beta(name, email, wallet).await {
        return Err(match e {
            StoreError::Conflict { constraint } if constraint.contains("email") => {
                ApiError::conflict(constraint, "You've already signed up with this email.")
            }
            StoreError::Conflict { constraint } if constraint.contains("wallet") => {
                ApiError::conflict(constraint, "This wallet is already registered.")
            }
            other => other.into(),
        });
    }

    // Signup row is already committed; a counter failure is reported but
    // not rolled back.
    if let Err(e) = state.store.increment_stat("beta_signups").await {
        tracing::error!("stat increment error: {}", e);
        return Err(ApiError::storage("Signup saved, but failed to update stats."));
    }

    Ok(Json(json!({ "success": true })))
}
