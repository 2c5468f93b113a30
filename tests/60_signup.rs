mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn signup_appends_email_to_the_waitlist_sheet() -> Result<()> {
    let app = common::spawn().await?;

    let res = app
        .post(
            "/api/signup",
            &json!({ "email": "new@example.com", "token": "captcha-token" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Email added successfully");

    let rows = app.state.sheets.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "new@example.com");
    Ok(())
}

#[tokio::test]
async fn signup_validates_before_touching_captcha_or_sheet() -> Result<()> {
    let app = common::spawn().await?;

    let res = app.post("/api/signup", &json!({})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Email is required");

    let res = app
        .post("/api/signup", &json!({ "email": "not-an-email" }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid email format");

    let res = app
        .post("/api/signup", &json!({ "email": "new@example.com" }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Captcha token is required");

    assert!(app.state.sheets.rows().is_empty());
    Ok(())
}

#[tokio::test]
async fn signup_rejects_failed_captcha() -> Result<()> {
    let app = common::spawn().await?;
    app.state.signup_captcha.set_verdict(false);

    let res = app
        .post(
            "/api/signup",
            &json!({ "email": "new@example.com", "token": "captcha-token" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await?["error"],
        "Captcha verification failed"
    );
    assert!(app.state.sheets.rows().is_empty());
    Ok(())
}

#[tokio::test]
async fn verify_captcha_proxies_the_widget_verdict() -> Result<()> {
    let app = common::spawn().await?;

    let res = app
        .post("/api/verify-captcha", &json!({ "token": "widget-token" }))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["success"], true);

    app.state.widget_captcha.set_verdict(false);
    let res = app
        .post("/api/verify-captcha", &json!({ "token": "widget-token" }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["success"], false);
    Ok(())
}
