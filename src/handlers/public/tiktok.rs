use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::services::ResolveError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolverQuery {
    url: Option<String>,
}

/// GET /api/tiktok-resolver
///
/// Expands a shortened video link and returns its canonical URL plus embed
/// markup. The oEmbed endpoint is an uncontrolled third party, so a
/// non-JSON answer is rejected as 502 before any parse attempt.
pub async fn tiktok_resolver(
    State(state): State<AppState>,
    Query(query): Query<ResolverQuery>,
) -> Result<Json<Value>, ApiError> {
    let url = query
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::validation("Missing URL"))?;

    let video = state.resolver.resolve(url).await.map_err(|e| match e {
        ResolveError::NotJson { content_type, .. } => {
            tracing::warn!("oembed answered with {:?} instead of JSON", content_type);
            ApiError::upstream("Unexpected response from embed provider")
        }
        ResolveError::Transport(err) => {
            tracing::error!("short URL expansion failed: {}", err);
            ApiError::internal("Expansion failed")
        }
    })?;

    Ok(Json(json!({
        "fullUrl": video.full_url,
        "embedHtml": video.embed_html,
    })))
}
