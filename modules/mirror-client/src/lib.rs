pub mod error;

pub use error::{MirrorError, Result};

use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/124 Safari/537.36";

/// Fetches raw page documents, either straight from the origin or through a
/// reader mirror that re-serves the page (`{mirror}/http://host/path`).
pub struct MirrorClient {
    client: reqwest::Client,
    mirror_base: Option<String>,
}

impl MirrorClient {
    pub fn new(mirror_base: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            mirror_base: mirror_base
                .filter(|b| !b.trim().is_empty())
                .map(|b| b.trim_end_matches('/').to_string()),
        })
    }

    /// The URL actually requested for `url`.
    pub fn request_url(&self, url: &str) -> Result<String> {
        let stripped = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| MirrorError::InvalidUrl(url.to_string()))?;

        Ok(match self.mirror_base {
            Some(ref base) => format!("{base}/http://{stripped}"),
            None => url.to_string(),
        })
    }

    /// Fetch the document body for a URL.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let target = self.request_url(url)?;
        tracing::debug!(url, target = %target, "Fetching document");

        let mut req = self
            .client
            .get(&target)
            .header("Accept-Language", "en-US,en;q=0.9");
        if self.mirror_base.is_some() {
            // Ask the mirror for the page source rather than its markdown rendering.
            req = req.header("X-Return-Format", "html");
        }

        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}
