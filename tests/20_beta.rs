mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn request_access_creates_pending_record_once() -> Result<()> {
    let app = common::spawn().await?;
    let (user, _) = app.state.seed_user_with_token("alice", "alice@example.com", "user");

    let res = app
        .post("/api/beta/request-access", &json!({ "userId": user.id }))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["success"], true);

    let testers = app.state.store.beta_testers();
    assert_eq!(testers.len(), 1);
    assert_eq!(testers[0].user_id, user.id);
    assert!(!testers[0].is_approved);
    assert_eq!(testers[0].role, "user");

    // Same user again is rejected without a second record
    let res = app
        .post("/api/beta/request-access", &json!({ "userId": user.id }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await?["error"],
        "Request already submitted."
    );
    assert_eq!(app.state.store.beta_testers().len(), 1);
    Ok(())
}

#[tokio::test]
async fn request_access_rejects_unknown_or_missing_user() -> Result<()> {
    let app = common::spawn().await?;

    let res = app
        .post("/api/beta/request-access", &json!({ "userId": Uuid::new_v4() }))
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?["error"], "User not found.");

    let res = app.post("/api/beta/request-access", &json!({})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Missing userId");
    Ok(())
}

#[tokio::test]
async fn join_beta_records_signup_and_bumps_counter() -> Result<()> {
    let app = common::spawn().await?;
    let (_, token) = app.state.seed_user_with_token("alice", "alice@example.com", "user");

    let res = app.get("/api/join-beta/count").await?;
    assert_eq!(res.json::<Value>().await?["count"], 0);

    let res = app
        .post_auth(
            "/api/join-beta",
            &token,
            &json!({ "name": "Alice", "email": "alice@example.com", "wallet": "wallet-1" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["success"], true);

    assert_eq!(app.state.store.join_beta_rows().len(), 1);
    assert_eq!(app.state.store.counter("beta_signups"), 1);

    let res = app.get("/api/join-beta/count").await?;
    assert_eq!(res.json::<Value>().await?["count"], 1);
    Ok(())
}

#[tokio::test]
async fn join_beta_conflicts_name_the_duplicate_field() -> Result<()> {
    let app = common::spawn().await?;
    let (_, token) = app.state.seed_user_with_token("alice", "alice@example.com", "user");

    let first = json!({ "name": "Alice", "email": "alice@example.com", "wallet": "wallet-1" });
    app.post_auth("/api/join-beta", &token, &first).await?;

    // Duplicate email
    let res = app
        .post_auth(
            "/api/join-beta",
            &token,
            &json!({ "name": "Alice2", "email": "alice@example.com", "wallet": "wallet-2" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "You've already signed up with this email.");
    assert_eq!(body["constraint"], "join_beta_email_key");

    // Duplicate wallet
    let res = app
        .post_auth(
            "/api/join-beta",
            &token,
            &json!({ "name": "Alice3", "email": "other@example.com", "wallet": "wallet-1" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "This wallet is already registered.");
    assert_eq!(body["constraint"], "join_beta_wallet_key");

    // Neither conflict touched the signup counter again
    assert_eq!(app.state.store.join_beta_rows().len(), 1);
    assert_eq!(app.state.store.counter("beta_signups"), 1);
    Ok(())
}

#[tokio::test]
async fn grant_beta_access_flips_role_and_approves() -> Result<()> {
    let app = common::spawn().await?;
    let (_, admin_token) = app.state.seed_user_with_token("root", "root@example.com", "admin");
    let (target, _) = app.state.seed_user_with_token("carol", "carol@example.com", "user");

    let res = app
        .post_auth(
            "/api/grant-beta-access",
            &admin_token,
            &json!({ "userId": target.id }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["success"], true);

    let updated = app.state.store.user(target.id).unwrap();
    assert_eq!(updated.role, "beta-tester");

    let testers = app.state.store.beta_testers();
    assert_eq!(testers.len(), 1);
    assert!(testers[0].is_approved);
    assert_eq!(testers[0].role, "beta-tester");
    Ok(())
}

#[tokio::test]
async fn grant_beta_access_unknown_user_is_404() -> Result<()> {
    let app = common::spawn().await?;
    let (_, admin_token) = app.state.seed_user_with_token("root", "root@example.com", "admin");

    let res = app
        .post_auth(
            "/api/grant-beta-access",
            &admin_token,
            &json!({ "userId": Uuid::new_v4() }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        res.json::<Value>().await?["error"],
        "User not found or error fetching user"
    );
    Ok(())
}

#[tokio::test]
async fn notify_me_stores_email_and_sends_confirmation() -> Result<()> {
    let app = common::spawn().await?;
    let (_, token) = app.state.seed_user_with_token("alice", "alice@example.com", "user");

    let res = app
        .post_auth("/api/notify-me", &token, &json!({ "email": "alice@example.com" }))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(app.state.store.notify_me_rows(), vec!["alice@example.com"]);
    let sent = app.state.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, "notify");
    assert_eq!(sent[0].to, "alice@example.com");

    // Duplicate address is a conflict; the message names the field, not
    // the constraint
    let res = app
        .post_auth("/api/notify-me", &token, &json!({ "email": "alice@example.com" }))
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "A record with this email already exists");
    assert_eq!(body["constraint"], "notify_me_email_key");
    Ok(())
}

#[tokio::test]
async fn notify_me_surfaces_mailer_failure_after_insert() -> Result<()> {
    let app = common::spawn().await?;
    let (_, token) = app.state.seed_user_with_token("alice", "alice@example.com", "user");
    app.state.mailer.set_fail(true);

    let res = app
        .post_auth("/api/notify-me", &token, &json!({ "email": "alice@example.com" }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.json::<Value>().await?["code"], "BAD_GATEWAY");

    // The insert is not rolled back
    assert_eq!(app.state.store.notify_me_rows(), vec!["alice@example.com"]);
    Ok(())
}
