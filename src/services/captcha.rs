use async_trait::async_trait;
use serde::Deserialize;

use super::UpstreamError;

/// CAPTCHA verdict for a client-supplied token.
///
/// Two providers are in play: hCaptcha guards the waitlist signup, reCAPTCHA
/// backs the standalone verify widget. Both speak the same siteverify shape.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<bool, UpstreamError>;
}

#[derive(Deserialize)]
struct SiteverifyResponse {
    success: bool,
}

async fn siteverify(
    client: &reqwest::Client,
    endpoint: &str,
    secret: &str,
    token: &str,
    service: &'static str,
) -> Result<bool, UpstreamError> {
    let response = client
        .post(endpoint)
        .form(&[("response", token), ("secret", secret)])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        return Err(UpstreamError::UnexpectedResponse {
            service,
            detail: format!("{}: {}", status, detail),
        });
    }

    let verdict: SiteverifyResponse = response.json().await?;
    Ok(verdict.success)
}

pub struct Hcaptcha {
    client: reqwest::Client,
    secret: String,
    endpoint: String,
}

impl Hcaptcha {
    pub fn new(client: reqwest::Client, secret: impl Into<String>) -> Self {
        Self {
            client,
            secret: secret.into(),
            endpoint: "https://api.hcaptcha.com/siteverify".to_string(),
        }
    }
}

#[async_trait]
impl CaptchaVerifier for Hcaptcha {
    async fn verify(&self, token: &str) -> Result<bool, UpstreamError> {
        siteverify(&self.client, &self.endpoint, &self.secret, token, "hcaptcha").await
    }
}

pub struct Recaptcha {
    client: reqwest::Client,
    secret: String,
    endpoint: String,
}

impl Recaptcha {
    pub fn new(client: reqwest::Client, secret: impl Into<String>) -> Self {
        Self {
            client,
            secret: secret.into(),
            endpoint: "https://www.google.com/recaptcha/api/siteverify".to_string(),
        }
    }
}

#[async_trait]
impl CaptchaVerifier for Recaptcha {
    async fn verify(&self, token: &str) -> Result<bool, UpstreamError> {
        siteverify(&self.client, &self.endpoint, &self.secret, token, "recaptcha").await
    }
}
