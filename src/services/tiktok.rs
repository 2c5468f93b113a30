use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use thiserror::Error;

/// Resolves a short-form video URL to its canonical address and embed markup.
pub struct TikTokResolver {
    client: reqwest::Client,
    oembed_base: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedVideo {
    pub full_url: String,
    pub embed_html: Option<String>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The oEmbed endpoint answered with something other than JSON (usually
    /// an HTML error page). Checked before any parse attempt.
    #[error("unexpected oembed content-type: {content_type}")]
    NotJson { content_type: String, body: String },
}

impl TikTokResolver {
    pub fn new(client: reqwest::Client, oembed_base: impl Into<String>) -> Self {
        Self {
            client,
            oembed_base: oembed_base.into(),
        }
    }

    pub async fn resolve(&self, raw_url: &str) -> Result<ResolvedVideo, ResolveError> {
        // Shortened links redirect to the canonical video URL; the client
        // follows redirects, so the final URL is the resolved one.
        let resolved = self.client.head(raw_url).send().await?;
        let full_url = resolved.url().to_string();

        let encoded: String = url::form_urlencoded::byte_serialize(full_url.as_bytes()).collect();
        let oembed_url = format!("{}?url={}", self.oembed_base, encoded);

        let response = self.client.get(&oembed_url).send().await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.contains("application/json") {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::NotJson { content_type, body });
        }

        let doc: Value = response.json().await?;
        Ok(ResolvedVideo {
            full_url: doc
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(full_url),
            embed_html: doc.get("html").and_then(Value::as_str).map(str::to_string),
        })
    }
}
