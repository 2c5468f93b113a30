use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotifyMeBody {
    email: Option<String>,
}

/// POST /api/notify-me
///
/// Stores a launch-notification address, then sends the confirmation
/// template. The insert is not rolled back if the email send fails.
pub async fn notify_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NotifyMeBody>,
) -> Result<Json<Value>, ApiError> {
    tracing::debug!("notify-me request from {}", user.email);

    let email = body
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::validation("Missing email"))?;

    state.store.insert_notify_me(email).await?;

    state.mailer.notify_signup(email).await?;

    Ok(Json(json!({ "success": true })))
}
