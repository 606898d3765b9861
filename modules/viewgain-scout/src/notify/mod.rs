pub mod backend;
pub mod chunk;
pub mod discord;
pub mod slack;
pub mod stdout;

pub use backend::NotifyBackend;
pub use chunk::chunk;
pub use discord::DiscordChannel;
pub use slack::SlackWebhook;
pub use stdout::StdoutBackend;

use viewgain_common::{Secrets, TrackerError};

/// Pick the backend for this run. Discord wins over Slack when both are
/// configured; a real run with neither is a configuration error.
pub fn from_secrets(
    secrets: &Secrets,
    max_len: usize,
    dry_run: bool,
) -> Result<Box<dyn NotifyBackend>, TrackerError> {
    if dry_run {
        return Ok(Box::new(StdoutBackend));
    }

    match (&secrets.discord_bot_token, &secrets.discord_channel_id) {
        (Some(token), Some(channel)) => {
            return Ok(Box::new(DiscordChannel::new(token.clone(), channel.clone(), max_len)));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(TrackerError::Config(
                "DISCORD_BOT_TOKEN and DISCORD_CHANNEL_ID must be set together".into(),
            ));
        }
        (None, None) => {}
    }

    if let Some(url) = &secrets.slack_webhook_url {
        return Ok(Box::new(SlackWebhook::new(url.clone(), max_len)));
    }

    Err(TrackerError::Config(
        "no notifier configured: set DISCORD_BOT_TOKEN + DISCORD_CHANNEL_ID or SLACK_WEBHOOK_URL (or use --dry-run)".into(),
    ))
}
