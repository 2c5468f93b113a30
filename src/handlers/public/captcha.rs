use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyCaptchaBody {
    token: Option<String>,
}

/// POST /api/verify-captcha
///
/// Proxies the reCAPTCHA verdict for the client widget: `{success:true}` on
/// a passing token, 400 `{success:false}` otherwise.
pub async fn verify_captcha(
    State(state): State<AppState>,
    Json(body): Json<VerifyCaptchaBody>,
) -> Result<impl IntoResponse, ApiError> {
    let token = body.token.unwrap_or_default();

    let verdict = state.widget_captcha.verify(&token).await?;
    if verdict {
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Ok((StatusCode::BAD_REQUEST, Json(json!({ "success": false }))))
    }
}
