use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TrackerError};

/// Upper bound on account workers running at once.
pub const MAX_CONCURRENCY: usize = 5;

/// Longest report window accepted, one year.
pub const MAX_WINDOW_HOURS: u32 = 24 * 366;

/// Where documents come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Public web pages, fetched directly or through a reader mirror.
    Web,
    /// The TikAPI REST API (JSON documents).
    Tikapi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// Posts that gained views since the last run.
    Delta,
    /// Recent posts above a view threshold.
    Window,
}

impl std::str::FromStr for ReportMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "delta" => Ok(Self::Delta),
            "window" => Ok(Self::Window),
            other => Err(format!("unknown report mode '{other}' (expected delta|window)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStyle {
    TopViews,
    Newest,
}

/// Tunables loaded from the optional TOML file. Secrets stay in the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    pub accounts_file: PathBuf,
    pub cache_file: PathBuf,
    pub source: SourceKind,
    pub mode: ReportMode,
    pub report_style: ReportStyle,

    // Ranking / windowing
    pub window_hours: u32,
    pub min_views: u64,
    pub max_posts_per_account: u32,
    pub top_n: usize,
    /// Only used in the report header ("last 8H"): how often the tracker runs.
    pub label_hours: u32,

    // Fetch scheduling
    pub request_delay_ms: u64,
    pub request_jitter_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub fetch_timeout_secs: u64,
    pub concurrency: usize,
    pub run_budget_secs: Option<u64>,

    // Extraction behavior
    pub reuse_listing_metrics: bool,
    pub variant_fallback: bool,

    // Notification
    pub notify_max_len: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            accounts_file: PathBuf::from("accounts.txt"),
            cache_file: PathBuf::from("views_cache.json"),
            source: SourceKind::Web,
            mode: ReportMode::Delta,
            report_style: ReportStyle::TopViews,
            window_hours: 48,
            min_views: 1000,
            max_posts_per_account: 30,
            top_n: 10,
            label_hours: 8,
            request_delay_ms: 400,
            request_jitter_ms: 0,
            max_retries: 2,
            backoff_base_ms: 1000,
            fetch_timeout_secs: 30,
            concurrency: 1,
            run_budget_secs: None,
            reuse_listing_metrics: true,
            variant_fallback: true,
            notify_max_len: 1900,
        }
    }
}

impl TrackerConfig {
    /// Load from `path`. A missing file at the default location yields the
    /// defaults; a missing file the caller named explicitly is an error.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if !path.exists() {
            if explicit {
                return Err(TrackerError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&content)
            .map_err(|e| TrackerError::Config(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "Config file loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| TrackerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_posts_per_account == 0 {
            return Err(TrackerError::Config(
                "max_posts_per_account must be at least 1".into(),
            ));
        }
        if self.top_n == 0 {
            return Err(TrackerError::Config("top_n must be at least 1".into()));
        }
        if self.window_hours == 0 || self.window_hours > MAX_WINDOW_HOURS {
            return Err(TrackerError::Config(format!(
                "window_hours must be between 1 and {MAX_WINDOW_HOURS}"
            )));
        }
        if self.notify_max_len < 100 {
            return Err(TrackerError::Config(
                "notify_max_len must be at least 100".into(),
            ));
        }
        Ok(())
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.window_hours))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn run_budget(&self) -> Option<Duration> {
        self.run_budget_secs.map(Duration::from_secs)
    }

    /// Worker count clamped to `1..=MAX_CONCURRENCY`.
    pub fn workers(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

/// Credentials and endpoints loaded from the environment (`.env` honored).
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub tikapi_key: Option<String>,
    pub mirror_base_url: Option<String>,
    pub discord_bot_token: Option<String>,
    pub discord_channel_id: Option<String>,
    pub slack_webhook_url: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            tikapi_key: non_empty_env("TIKAPI_KEY"),
            mirror_base_url: non_empty_env("MIRROR_BASE_URL"),
            discord_bot_token: non_empty_env("DISCORD_BOT_TOKEN"),
            discord_channel_id: non_empty_env("DISCORD_CHANNEL_ID"),
            slack_webhook_url: non_empty_env("SLACK_WEBHOOK_URL"),
        }
    }

    /// The TikAPI source cannot run without a key.
    pub fn require_source(&self, source: SourceKind) -> Result<()> {
        if source == SourceKind::Tikapi && self.tikapi_key.is_none() {
            return Err(TrackerError::Config(
                "source = \"tikapi\" requires TIKAPI_KEY".into(),
            ));
        }
        Ok(())
    }

    pub fn log_redacted(&self) {
        fn preview(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let n = v.chars().take(5).map(char::len_utf8).sum::<usize>();
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Secrets loaded:");
        tracing::info!("  TIKAPI_KEY: {}", preview(&self.tikapi_key));
        tracing::info!(
            "  MIRROR_BASE_URL: {}",
            self.mirror_base_url.as_deref().unwrap_or("<not set>")
        );
        tracing::info!("  DISCORD_BOT_TOKEN: {}", preview(&self.discord_bot_token));
        tracing::info!(
            "  DISCORD_CHANNEL_ID: {}",
            self.discord_channel_id.as_deref().unwrap_or("<not set>")
        );
        tracing::info!("  SLACK_WEBHOOK_URL: {}", preview(&self.slack_webhook_url));
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
