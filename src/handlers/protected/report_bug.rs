use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::NewBugReport;

#[derive(Debug, Deserialize)]
pub struct ReportBugBody {
    bug_content: Option<String>,
    username: Option<String>,
    email: Option<String>,
    pubkey: Option<String>,
}

/// POST /api/report-bug
///
/// Files a bug report and sends a received-confirmation email. The email is
/// best-effort: a send failure is logged but the report still counts.
pub async fn report_bug(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ReportBugBody>,
) -> Result<Json<Value>, ApiError> {
    tracing::debug!("bug report from {}", user.email);

    let bug_content = body
        .bug_content
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Missing bug_content"))?;
    let username = body
        .username
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Missing username"))?;
    let email = body
        .email
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("Missing email"))?;

    let report = NewBugReport {
        bug_content: bug_content.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        pubkey: body.pubkey.clone(),
    };

    state.store.insert_bug_report(&report).await.map_err(|e| {
        tracing::error!("bug report insert failed: {}", e);
        ApiError::storage("Failed to create bug report")
    })?;

    if let Err(e) = state
        .mailer
        .bug_report_received(email, username, bug_content)
        .await
    {
        tracing::error!("failed to send bug report email: {}", e);
    }

    Ok(Json(json!({ "message": "Bug report submitted successfully" })))
}
