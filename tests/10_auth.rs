mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = common::spawn().await?;

    let res = app.get("/health").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn gated_routes_reject_missing_bearer() -> Result<()> {
    let app = common::spawn().await?;

    for path in ["/api/join-beta", "/api/notify-me", "/api/report-bug"] {
        let res = app.post(path, &json!({})).await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{}", path);
        let body = res.json::<Value>().await?;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn gated_routes_reject_unknown_token() -> Result<()> {
    let app = common::spawn().await?;

    let res = app
        .post_auth("/api/report-bug", "not-a-real-token", &json!({}))
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "Invalid token");
    Ok(())
}

#[tokio::test]
async fn admin_routes_reject_non_admin_caller() -> Result<()> {
    let app = common::spawn().await?;
    let (user, token) = app.state.seed_user_with_token("bob", "bob@example.com", "user");

    let res = app
        .post_auth(
            "/api/grant-beta-access",
            &token,
            &json!({ "userId": user.id }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "Admins only");
    assert_eq!(body["code"], "FORBIDDEN");

    // Rejection lands in the audit sink
    let entries = app.state.store.audit_entries();
    assert!(entries
        .iter()
        .any(|e| e.message == "Non-admin attempted admin operation"));
    Ok(())
}

#[tokio::test]
async fn admin_caller_passes_role_gate() -> Result<()> {
    let app = common::spawn().await?;
    let (_, token) = app.state.seed_user_with_token("root", "root@example.com", "admin");

    // Past both gates, the handler's own validation answers
    let res = app.post_auth("/api/grant-beta-access", &token, &json!({})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "Missing userId");
    Ok(())
}
