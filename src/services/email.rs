use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::SendGridConfig;

use super::UpstreamError;

/// Transactional template email used by the signup and bug-report flows.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn notify_signup(&self, email: &str) -> Result<(), UpstreamError>;

    async fn bug_report_received(
        &self,
        email: &str,
        username: &str,
        bug_description: &str,
    ) -> Result<(), UpstreamError>;

    async fn bug_closed(
        &self,
        email: &str,
        username: &str,
        bug_description: &str,
    ) -> Result<(), UpstreamError>;

    async fn bug_payout_issued(
        &self,
        email: &str,
        username: &str,
        bug_description: &str,
        amount: f64,
        tx: &str,
    ) -> Result<(), UpstreamError>;
}

const SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// SendGrid v3 dynamic-template mailer.
pub struct SendGrid {
    client: reqwest::Client,
    config: SendGridConfig,
}

impl SendGrid {
    pub fn new(client: reqwest::Client, config: SendGridConfig) -> Self {
        Self { client, config }
    }

    async fn send_template(
        &self,
        to: &str,
        template_id: &str,
        data: Value,
    ) -> Result<(), UpstreamError> {
        let body = json!({
            "from": {
                "email": self.config.from_email,
                "name": self.config.from_name,
            },
            "reply_to": { "email": self.config.reply_to },
            "template_id": template_id,
            "personalizations": [{
                "to": [{ "email": to }],
                "dynamic_template_data": data,
            }],
        });

        let response = self
            .client
            .post(SEND_URL)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(UpstreamError::UnexpectedResponse {
                service: "sendgrid",
                detail: format!("{}: {}", status, detail),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for SendGrid {
    async fn notify_signup(&self, email: &str) -> Result<(), UpstreamError> {
        self.send_template(
            email,
            &self.config.notify_template,
            json!({
                "email": email,
                "companyName": self.config.company_name,
                "companyAddress": self.config.company_address,
            }),
        )
        .await
    }

    async fn bug_report_received(
        &self,
        email: &str,
        username: &str,
        bug_description: &str,
    ) -> Result<(), UpstreamError> {
        self.send_template(
            email,
            &self.config.bug_received_template,
            json!({ "username": username, "bugDescription": bug_description }),
        )
        .await
    }

    async fn bug_closed(
        &self,
        email: &str,
        username: &str,
        bug_description: &str,
    ) -> Result<(), UpstreamError> {
        self.send_template(
            email,
            &self.config.bug_closed_template,
            json!({ "username": username, "bugDescription": bug_description }),
        )
        .await
    }

    async fn bug_payout_issued(
        &self,
        email: &str,
        username: &str,
        bug_description: &str,
        amount: f64,
        tx: &str,
    ) -> Result<(), UpstreamError> {
        self.send_template(
            email,
            &self.config.bug_paid_out_template,
            json!({
                "username": username,
                "bugDescription": bug_description,
                "amount": amount,
                "tx": tx,
            }),
        )
        .await
    }
}
