mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn stats_get_returns_zeros_before_any_activity() -> Result<()> {
    let app = common::spawn().await?;

    let res = app.get("/api/stats/get").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["visits"], 0);
    assert_eq!(body["betaSignups"], 0);
    assert_eq!(body["notifySignups"], 0);
    Ok(())
}

#[tokio::test]
async fn increment_beta_bumps_the_counter() -> Result<()> {
    let app = common::spawn().await?;

    for _ in 0..2 {
        let res = app.post("/api/stats/increment-beta", &json!({})).await?;
        assert_eq!(res.status(), StatusCode::OK);
    }
    assert_eq!(app.state.store.counter("beta_signups"), 2);

    let res = app.get("/api/stats/get").await?;
    assert_eq!(res.json::<Value>().await?["betaSignups"], 2);
    Ok(())
}

#[tokio::test]
async fn increment_visits_records_anonymous_traffic() -> Result<()> {
    let app = common::spawn().await?;

    let res = app
        .client
        .post(format!("{}/api/stats/increment-visits?path=/landing", app.base_url))
        .header("x-forwarded-for", "1.2.3.4, 10.0.0.1")
        .header("user-agent", "test-agent/1.0")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["success"], true);

    let visits = app.state.store.visits();
    assert_eq!(visits.len(), 1);
    // First hop of the forwarded chain wins
    assert_eq!(visits[0].ip, "1.2.3.4");
    assert_eq!(visits[0].ua, "test-agent/1.0");
    assert_eq!(visits[0].path, "/landing");

    let res = app.get("/api/stats/get").await?;
    assert_eq!(res.json::<Value>().await?["visits"], 1);
    Ok(())
}

#[tokio::test]
async fn increment_visits_defaults_unknown_fields() -> Result<()> {
    let app = common::spawn().await?;

    let res = app
        .client
        .post(format!("{}/api/stats/increment-visits", app.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let visits = app.state.store.visits();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].ip, "unknown");
    assert_eq!(visits[0].path, "unknown");
    Ok(())
}

#[tokio::test]
async fn increment_visits_skips_authenticated_callers() -> Result<()> {
    let app = common::spawn().await?;
    let (_, token) = app.state.seed_user_with_token("alice", "alice@example.com", "user");

    let res = app
        .client
        .post(format!("{}/api/stats/increment-visits", app.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "authenticated");
    assert!(app.state.store.visits().is_empty());
    Ok(())
}

#[tokio::test]
async fn increment_visits_counts_invalid_tokens_as_anonymous() -> Result<()> {
    let app = common::spawn().await?;

    let res = app
        .client
        .post(format!("{}/api/stats/increment-visits", app.base_url))
        .bearer_auth("stale-or-bogus")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["success"], true);
    assert_eq!(app.state.store.visits().len(), 1);
    Ok(())
}
