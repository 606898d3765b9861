use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl MirrorError {
    /// Network failures, throttling and server-side errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            MirrorError::Network(_) => true,
            MirrorError::Http { status, .. } => *status == 429 || *status >= 500,
            MirrorError::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for MirrorError {
    fn from(err: reqwest::Error) -> Self {
        MirrorError::Network(err.to_string())
    }
}
