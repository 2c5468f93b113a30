use anyhow::Result;
use serde_json::Value;

use coinpetitive_api::app;
use coinpetitive_api::testing::TestState;

/// One API instance per test, served on an ephemeral loopback port with
/// every external dependency swapped for an in-memory fake. Tests reach
/// the fakes through `state` to seed data and inspect writes.
pub struct TestApp {
    pub base_url: String,
    pub state: TestState,
    pub client: reqwest::Client,
}

pub async fn spawn() -> Result<TestApp> {
    spawn_with(TestState::new()).await
}

pub async fn spawn_with(state: TestState) -> Result<TestApp> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let router = app(state.app_state());
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(TestApp {
        base_url: format!("http://{}", addr),
        state,
        client: reqwest::Client::new(),
    })
}

impl TestApp {
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self.client.get(format!("{}{}", self.base_url, path)).send().await?)
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?)
    }

    pub async fn post_auth(
        &self,
        path: &str,
        token: &str,
        body: &Value,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }
}
