pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
pub mod store;
pub mod testing;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the full application router over the injected state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state))
        .merge(admin_routes(&state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    use handlers::public;

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/beta/request-access", post(public::request_access))
        .route("/api/join-beta/count", get(public::join_beta_count))
        .route("/api/signup", post(public::signup))
        .route("/api/stats/get", get(public::stats_get))
        .route("/api/stats/increment-beta", post(public::increment_beta))
        .route("/api/stats/increment-visits", post(public::increment_visits))
        .route("/api/tiktok-resolver", get(public::tiktok_resolver))
        .route("/api/verify-captcha", post(public::verify_captcha))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use handlers::protected;

    Router::new()
        .route("/api/join-beta", post(protected::join_beta))
        .route("/api/notify-me", post(protected::notify_me))
        .route("/api/report-bug", post(protected::report_bug))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_bearer,
        ))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    use handlers::admin;

    // require_bearer runs first, then the role gate
    Router::new()
        .route("/api/grant-beta-access", post(admin::grant_beta_access))
        .route("/api/remove-bug", post(admin::remove_bug))
        .route("/api/payout", post(admin::payout))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_bearer,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn root_banner_is_public() {
        let state = testing::TestState::new().app_state();
        let response = app(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gated_route_rejects_anonymous_requests() {
        let state = testing::TestState::new().app_state();
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/report-bug")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
