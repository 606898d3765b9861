use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use super::backend::NotifyBackend;
use super::chunk::chunk;

const API_BASE: &str = "https://discord.com/api/v10";
const EMBED_COLOR: u32 = 0x00ff66;
const CHUNK_PAUSE: Duration = Duration::from_millis(350);

/// Posts to a Discord channel as the bot, one embed per chunk.
pub struct DiscordChannel {
    bot_token: String,
    channel_id: String,
    max_len: usize,
    http: reqwest::Client,
}

impl DiscordChannel {
    pub fn new(bot_token: String, channel_id: String, max_len: usize) -> Self {
        Self {
            bot_token,
            channel_id,
            max_len,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, description: &str) -> anyhow::Result<()> {
        let payload = json!({
            "content": "",
            "embeds": [{ "description": description, "color": EMBED_COLOR }],
        });

        let resp = self
            .http
            .post(format!("{API_BASE}/channels/{}/messages", self.channel_id))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Discord returned non-success");
            anyhow::bail!("Discord returned {status}");
        }

        Ok(())
    }
}

#[async_trait]
impl NotifyBackend for DiscordChannel {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        let pieces = chunk(text, self.max_len);
        for (i, piece) in pieces.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(CHUNK_PAUSE).await;
            }
            self.post(piece).await?;
            debug!(chunk = i + 1, of = pieces.len(), "Discord message sent");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
