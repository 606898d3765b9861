use async_trait::async_trait;

/// Where a rendered report goes. Backends split the text to their own
/// message size limit with [`super::chunk`].
#[async_trait]
pub trait NotifyBackend: Send + Sync {
    async fn send(&self, text: &str) -> anyhow::Result<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
