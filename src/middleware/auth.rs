use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};
use serde_json::json;

use crate::auth::{bearer_token, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{audit, AuditEntry};

/// Bearer authentication middleware: extracts the token, exchanges it for a
/// caller identity, and injects [`AuthUser`] into the request extensions.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?
        .to_string();

    let user = state
        .auth
        .verify(&token)
        .await
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Role gate layered inside [`require_bearer`]: the caller's stored profile
/// must carry the admin role. Rejected attempts go to the audit sink.
pub async fn require_admin(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let role = match state.store.user_role(user.id).await {
        Ok(role) => role,
        Err(e) => {
            tracing::warn!("role lookup failed for {}: {}", user.id, e);
            None
        }
    };

    match role.as_deref() {
        Some("admin") => Ok(next.run(request).await),
        other => {
            audit(
                state.store.as_ref(),
                AuditEntry::warn(
                    "auth",
                    "Non-admin attempted admin operation",
                    json!({ "user_id": user.id, "role": other }),
                ),
            )
            .await;
            Err(ApiError::forbidden("Admins only"))
        }
    }
}
