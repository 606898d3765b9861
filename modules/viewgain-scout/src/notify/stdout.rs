use async_trait::async_trait;

use super::backend::NotifyBackend;

/// Prints the report instead of sending it. Used for dry runs.
pub struct StdoutBackend;

#[async_trait]
impl NotifyBackend for StdoutBackend {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        println!("{text}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}
