use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{audit, AuditEntry, BugRemoval};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBugBody {
    bug_id: Option<Uuid>,
    reason: Option<String>,
    email: Option<String>,
    username: Option<String>,
    bug_description: Option<String>,
}

/// POST /api/remove-bug (admin)
///
/// Removal saga: audit row, then delete, then a best-effort closure email
/// and success marker. Nothing is written before validation passes; after
/// that each step is independently fallible and never compensated.
pub async fn remove_bug(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(body): Json<RemoveBugBody>,
) -> Result<Json<Value>, ApiError> {
    let (bug_id, reason, email, username, bug_description) = match (
        body.bug_id,
        body.reason.as_deref().filter(|v| !v.is_empty()),
        body.email.as_deref().filter(|v| !v.is_empty()),
        body.username.as_deref().filter(|v| !v.is_empty()),
        body.bug_description.as_deref().filter(|v| !v.is_empty()),
    ) {
        (Some(a), Some(b), Some(c), Some(d), Some(e)) => (a, b, c, d, e),
        _ => {
            audit(
                state.store.as_ref(),
                AuditEntry::error(
                    "bug-report",
                    "Missing fields in bug removal request",
                    json!({
                        "bug_id": body.bug_id,
                        "username": body.username,
                        "email": body.email,
                    }),
                ),
            )
            .await;
            return Err(ApiError::validation("Missing required fields"));
        }
    };

    let removal = BugRemoval {
        bug_id,
        removed_by: admin.id,
        reason: reason.to_string(),
        email: email.to_string(),
        username: username.to_string(),
    };

    if let Err(e) = state.store.insert_bug_removal(&removal).await {
        audit(
            state.store.as_ref(),
            AuditEntry::error(
                "bug-report",
                "Failed to log bug removal",
                json!({ "bug_id": bug_id, "user_id": admin.id, "error": e.to_string() }),
            ),
        )
        .await;
        return Err(ApiError::storage("DB insert failed"));
    }

    if let Err(e) = state.store.delete_bug_report(bug_id).await {
        audit(
            state.store.as_ref(),
            AuditEntry::error(
                "bug-report",
                "Failed to delete bug report",
                json!({ "bug_id": bug_id, "error": e.to_string() }),
            ),
        )
        .await;
        return Err(ApiError::storage("Delete failed"));
    }

    // The row is gone; an email failure at this point would misreport the
    // mutation, so it is logged instead of surfaced.
    if let Err(e) = state.mailer.bug_closed(email, username, bug_description).await {
        audit(
            state.store.as_ref(),
            AuditEntry::error(
                "bug-report",
                "Failed to send bug closed email",
                json!({ "bug_id": bug_id, "email": email, "error": e.to_string() }),
            ),
        )
        .await;
    }

    audit(
        state.store.as_ref(),
        AuditEntry::info(
            "bug-report",
            "Bug successfully removed and user notified",
            json!({ "bug_id": bug_id, "removed_by": admin.id }),
        ),
    )
    .await;

    Ok(Json(json!({ "success": true })))
}
