pub mod error;
pub mod types;

pub use error::{Result, TikApiError};
pub use types::ApiStatus;

use std::time::Duration;

pub const BASE_URL: &str = "https://api.tikapi.io";

pub struct TikApiClient {
    client: reqwest::Client,
    api_key: String,
}

impl TikApiClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key })
    }

    /// Public profile lookup; the payload carries `userInfo.user.secUid`.
    pub fn profile_url(username: &str) -> String {
        endpoint("/public/check", &[("username", username)])
    }

    /// Recent posts for an account identity, newest first.
    pub fn posts_url(sec_uid: &str, count: u32) -> String {
        endpoint(
            "/public/posts",
            &[("secUid", sec_uid), ("count", &count.to_string()), ("cursor", "0")],
        )
    }

    /// Single post detail; the payload carries `itemInfo.itemStruct`.
    pub fn video_url(id: &str) -> String {
        endpoint("/public/video", &[("id", id)])
    }

    /// GET an API URL and return the raw JSON body. See [`classify`].
    pub async fn get(&self, url: &str) -> Result<String> {
        if !url.starts_with(BASE_URL) {
            return Err(TikApiError::Endpoint(url.to_string()));
        }

        let resp = self
            .client
            .get(url)
            .header("X-API-KEY", &self.api_key)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        classify(status, body)
            .inspect_err(|e| tracing::debug!(url, error = %e, "TikAPI request failed"))
    }
}

/// Turn an HTTP status and body into the payload or a typed error.
/// Throttling and server errors stay retryable even when they carry an
/// error envelope.
pub fn classify(status: u16, body: String) -> Result<String> {
    let envelope = serde_json::from_str::<ApiStatus>(&body).ok();

    if status == 429 || status >= 500 {
        let message = envelope.and_then(|e| e.message).unwrap_or(body);
        return Err(TikApiError::Api { status, message });
    }

    let Some(envelope) = envelope else {
        return Err(match status {
            200..=299 => TikApiError::NotJson(status),
            _ => TikApiError::Api { status, message: body },
        });
    };

    if envelope.is_error() {
        let message = envelope
            .message
            .unwrap_or_else(|| "TikAPI error".to_string());
        return Err(TikApiError::Rejected(message));
    }

    if !(200..300).contains(&status) {
        return Err(TikApiError::Api { status, message: body });
    }

    Ok(body)
}

fn endpoint(path: &str, query: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter().copied())
        .finish();
    format!("{BASE_URL}{path}?{query}")
}
