use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::backend::NotifyBackend;
use super::chunk::chunk;

/// Slack incoming webhook notification backend.
pub struct SlackWebhook {
    webhook_url: String,
    max_len: usize,
    http: reqwest::Client,
}

impl SlackWebhook {
    pub fn new(webhook_url: String, max_len: usize) -> Self {
        Self {
            webhook_url,
            max_len,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, payload: serde_json::Value) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack webhook returned non-success");
            anyhow::bail!("Slack webhook returned {status}");
        }

        Ok(())
    }
}

#[async_trait]
impl NotifyBackend for SlackWebhook {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        for piece in chunk(text, self.max_len) {
            let payload = json!({
                "text": piece,
                "unfurl_links": false,
            });
            self.post(payload).await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
