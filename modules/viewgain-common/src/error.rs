use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// A failed document fetch, as reported by any fetcher backend.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Network or HTTP-level failure worth another attempt.
    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    /// The upstream answered but refused the request; retrying won't help.
    #[error("upstream rejected {url}: {message}")]
    Rejected { url: String, message: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. } | FetchError::Rejected { url, .. } => url,
        }
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("identity not found for @{handle}")]
    IdentityNotFound { handle: String },

    #[error("cache I/O error at {path}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {path} is not valid JSON: {source}")]
    CacheCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}
