use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{audit, AuditEntry};

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    email: Option<String>,
    token: Option<String>,
}

/// POST /api/signup
///
/// Waitlist signup: validate the email, verify the hCaptcha token, then
/// append `[email, timestamp]` to the configured spreadsheet range.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupBody>,
) -> Result<Json<Value>, ApiError> {
    let email = body
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::validation("Email is required"))?;

    if !is_valid_email(email) {
        return Err(ApiError::validation("Invalid email format"));
    }

    let token = body
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::validation("Captcha token is required"))?;

    let verdict = state.signup_captcha.verify(token).await.map_err(|e| {
        tracing::error!("hcaptcha verification error: {}", e);
        ApiError::internal("Captcha config error")
    })?;
    if !verdict {
        return Err(ApiError::validation("Captcha verification failed"));
    }

    if let Err(e) = state.sheets.append_signup(email, Utc::now()).await {
        audit(
            state.store.as_ref(),
            AuditEntry::error(
                "Email Sign Up",
                "Error adding email to Google Sheet",
                json!({ "error": e.to_string() }),
            ),
        )
        .await;
        return Err(ApiError::internal("Error adding email to Google Sheet"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Email added successfully",
    })))
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain, no
/// whitespace.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user name@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
    }
}
