use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use coinpetitive_api::auth::JwtVerifier;
use coinpetitive_api::config::AppConfig;
use coinpetitive_api::services::{
    GoogleSheets, Hcaptcha, HttpTreasury, Recaptcha, SendGrid, TikTokResolver,
};
use coinpetitive_api::state::AppState;
use coinpetitive_api::store::PgStore;
use coinpetitive_api::{app, store::Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and friends
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("starting Coinpetitive API on port {}", config.port);

    let store: Arc<dyn Store> = Arc::new(
        PgStore::connect(&config.database_url, config.database_max_connections).await?,
    );

    let http = reqwest::Client::new();
    let state = AppState {
        store,
        auth: Arc::new(JwtVerifier::new(config.jwt_secret.clone())),
        mailer: Arc::new(SendGrid::new(http.clone(), config.sendgrid.clone())),
        sheets: Arc::new(GoogleSheets::new(http.clone(), config.sheets.clone())),
        signup_captcha: Arc::new(Hcaptcha::new(
            http.clone(),
            config.captcha.hcaptcha_secret.clone(),
        )),
        widget_captcha: Arc::new(Recaptcha::new(
            http.clone(),
            config.captcha.recaptcha_secret.clone(),
        )),
        treasury: Arc::new(HttpTreasury::new(
            http.clone(),
            config.payout.treasury_url.clone(),
            config.payout.treasury_api_key.clone(),
        )),
        resolver: Arc::new(TikTokResolver::new(http, config.tiktok_oembed_base.clone())),
        payout: config.payout.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
