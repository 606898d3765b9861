use thiserror::Error;

pub type Result<T> = std::result::Result<T, TikApiError>;

#[derive(Debug, Error)]
pub enum TikApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("TikAPI returned non JSON response, HTTP {0}")]
    NotJson(u16),

    #[error("TikAPI error: {0}")]
    Rejected(String),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),
}

impl TikApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TikApiError::Network(_) => true,
            TikApiError::Api { status, .. } => *status == 429 || *status >= 500,
            TikApiError::NotJson(status) => *status >= 500,
            TikApiError::Rejected(_) | TikApiError::Endpoint(_) => false,
        }
    }
}

impl From<reqwest::Error> for TikApiError {
    fn from(err: reqwest::Error) -> Self {
        TikApiError::Network(err.to_string())
    }
}
