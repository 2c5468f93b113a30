use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::SheetsConfig;

use super::UpstreamError;

/// Waitlist spreadsheet append.
#[async_trait]
pub trait SheetAppender: Send + Sync {
    async fn append_signup(&self, email: &str, at: DateTime<Utc>) -> Result<(), UpstreamError>;
}

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

#[derive(Serialize)]
struct ServiceAccountClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google Sheets v4 appender authenticated with a service-account JWT.
pub struct GoogleSheets {
    client: reqwest::Client,
    config: SheetsConfig,
}

impl GoogleSheets {
    pub fn new(client: reqwest::Client, config: SheetsConfig) -> Self {
        Self { client, config }
    }

    /// Mint an RS256 assertion and exchange it for a short-lived access token.
    async fn access_token(&self) -> Result<String, UpstreamError> {
        let now = Utc::now();
        let claims = ServiceAccountClaims {
            iss: &self.config.client_email,
            scope: SHEETS_SCOPE,
            aud: TOKEN_URL,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(10)).timestamp(),
        };

        let key = EncodingKey::from_rsa_pem(self.config.private_key.as_bytes())
            .map_err(|e| UpstreamError::Credentials(format!("invalid service account key: {}", e)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| UpstreamError::Credentials(format!("assertion signing failed: {}", e)))?;

        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(UpstreamError::UnexpectedResponse {
                service: "google-oauth",
                detail: format!("{}: {}", status, detail),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl SheetAppender for GoogleSheets {
    async fn append_signup(&self, email: &str, at: DateTime<Utc>) -> Result<(), UpstreamError> {
        let token = self.access_token().await?;

        let range: String = url::form_urlencoded::byte_serialize(self.config.range.as_bytes())
            .collect();
        let append_url = format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.config.sheet_id, range
        );

        let response = self
            .client
            .post(&append_url)
            .bearer_auth(&token)
            .json(&json!({ "values": [[email, at.to_rfc3339()]] }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(UpstreamError::UnexpectedResponse {
                service: "google-sheets",
                detail: format!("{}: {}", status, detail),
            });
        }
        Ok(())
    }
}
