mod beta;
mod captcha;
mod signup;
mod stats;
mod tiktok;

pub use beta::{join_beta_count, request_access};
pub use captcha::verify_captcha;
pub use signup::signup;
pub use stats::{increment_beta, increment_visits, stats_get};
pub use tiktok::tiktok_resolver;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Coinpetitive API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "beta": "/api/beta/request-access, /api/join-beta[/count], /api/grant-beta-access",
                "bugs": "/api/report-bug, /api/remove-bug, /api/payout",
                "waitlist": "/api/signup, /api/notify-me",
                "stats": "/api/stats/get, /api/stats/increment-beta, /api/stats/increment-visits",
                "misc": "/api/tiktok-resolver, /api/verify-captcha",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
