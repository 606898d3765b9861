use serde::Deserialize;

/// The envelope fields every TikAPI response carries next to its payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiStatus {
    pub status: Option<String>,
    pub message: Option<String>,
}

impl ApiStatus {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}
