//! Document fetching: a backend trait plus the paced, retrying wrapper every
//! pipeline request goes through.

pub mod retry;
pub mod scheduler;

pub use retry::RetryPolicy;
pub use scheduler::{FetchCounters, ScheduledFetcher};

use async_trait::async_trait;

use mirror_client::{MirrorClient, MirrorError};
use tikapi_client::{TikApiClient, TikApiError};
use viewgain_common::FetchError;

/// URL in, document body out. Implementations report retryable failures as
/// `FetchError::Transport` and everything else as `FetchError::Rejected`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl Fetcher for MirrorClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        MirrorClient::fetch(self, url)
            .await
            .map_err(|e| from_mirror(url, e))
    }

    fn name(&self) -> &str {
        "web"
    }
}

#[async_trait]
impl Fetcher for TikApiClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.get(url).await.map_err(|e| from_tikapi(url, e))
    }

    fn name(&self) -> &str {
        "tikapi"
    }
}

/// Error bodies can be whole HTML pages; keep diagnostics readable.
const MAX_MESSAGE_CHARS: usize = 200;

fn brief(message: String) -> String {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message,
    }
}

fn from_mirror(url: &str, err: MirrorError) -> FetchError {
    let (url, message) = (url.to_string(), brief(err.to_string()));
    if err.is_retryable() {
        FetchError::Transport { url, message }
    } else {
        FetchError::Rejected { url, message }
    }
}

fn from_tikapi(url: &str, err: TikApiError) -> FetchError {
    let (url, message) = (url.to_string(), brief(err.to_string()));
    if err.is_retryable() {
        FetchError::Transport { url, message }
    } else {
        FetchError::Rejected { url, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_by_retryability() {
        let e = from_mirror(
            "https://x",
            MirrorError::Http {
                status: 503,
                message: "busy".into(),
            },
        );
        assert!(e.is_retryable());

        let e = from_mirror(
            "https://x",
            MirrorError::Http {
                status: 404,
                message: "gone".into(),
            },
        );
        assert!(!e.is_retryable());

        let e = from_tikapi("https://api", TikApiError::Rejected("bad secUid".into()));
        assert!(!e.is_retryable());
        assert_eq!(e.url(), "https://api");

        let e = from_tikapi("https://api", TikApiError::Network("reset".into()));
        assert!(e.is_retryable());
    }

    #[test]
    fn long_error_bodies_are_shortened() {
        let e = from_mirror(
            "https://x",
            MirrorError::Http {
                status: 500,
                message: "<html>".repeat(200),
            },
        );
        let FetchError::Transport { message, .. } = e else {
            panic!("expected transport error");
        };
        assert!(message.ends_with("..."));
        assert_eq!(message.chars().count(), MAX_MESSAGE_CHARS + 3);
    }
}
