use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::UpstreamError;

/// Issues the on-chain CPT transfer for admin payouts and returns the
/// transaction signature. The signer itself is an external collaborator;
/// this crate only performs the bookkeeping around it.
#[async_trait]
pub trait Treasury: Send + Sync {
    async fn transfer(&self, wallet: &str, amount_cpt: f64) -> Result<String, UpstreamError>;
}

#[derive(Deserialize)]
struct TransferResponse {
    signature: String,
}

/// HTTP client for the treasury signing service.
pub struct HttpTreasury {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTreasury {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Treasury for HttpTreasury {
    async fn transfer(&self, wallet: &str, amount_cpt: f64) -> Result<String, UpstreamError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "wallet": wallet, "amount": amount_cpt }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(UpstreamError::UnexpectedResponse {
                service: "treasury",
                detail: format!("{}: {}", status, detail),
            });
        }

        let transfer: TransferResponse = response.json().await?;
        Ok(transfer.signature)
    }
}
