use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mirror_client::MirrorClient;
use tikapi_client::TikApiClient;
use viewgain_common::{parse_account_list, Account, ReportMode, Secrets, SourceKind, TrackerConfig};
use viewgain_scout::cache::{CacheStore, DeltaCache, JsonFileStore, MemoryStore};
use viewgain_scout::detect::{render_detections, Detector};
use viewgain_scout::fetch::{Fetcher, RetryPolicy, ScheduledFetcher};
use viewgain_scout::notify::{self, NotifyBackend};
use viewgain_scout::pipeline::{Tracker, TrackerSettings};
use viewgain_scout::rank::{rank_deltas, window_posts};
use viewgain_scout::report::Report;
use viewgain_scout::urls;

const DEFAULT_CONFIG: &str = "viewgain.toml";
/// Upper bound of the random jitter added to each retry backoff.
const RETRY_JITTER: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "viewgain", about = "Track view gains on short-video posts")]
struct Cli {
    /// TOML file with tunables (defaults apply when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Observe every account, update the cache and post the report
    Run {
        /// Override the configured report mode (delta|window)
        #[arg(long)]
        mode: Option<ReportMode>,

        /// Print the report and leave the cache file untouched
        #[arg(long)]
        dry_run: bool,
    },
    /// Show what extraction finds on each account's newest post
    Detect {
        #[arg(long, default_value_t = 12)]
        limit: usize,

        /// Print instead of posting
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json)?;

    info!("viewgain starting...");

    let (config_path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let config = TrackerConfig::load(&config_path, explicit)?;

    let secrets = Secrets::from_env();
    secrets.log_redacted();
    secrets.require_source(config.source)?;

    let accounts = load_accounts(&config.accounts_file)?;
    let fetcher = build_fetcher(&config, &secrets)?;
    info!(
        accounts = accounts.len(),
        source = fetcher.backend(),
        "Accounts loaded"
    );

    match cli.command {
        Command::Run { mode, dry_run } => {
            let notifier = notify::from_secrets(&secrets, config.notify_max_len, dry_run)?;
            run(config, mode, dry_run, accounts, fetcher, notifier).await
        }
        Command::Detect { limit, dry_run } => {
            let notifier = notify::from_secrets(&secrets, config.notify_max_len, dry_run)?;
            detect(&config, limit, &accounts, &fetcher, notifier.as_ref()).await
        }
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("viewgain=info".parse()?);
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read account list {}", path.display()))?;
    let accounts = parse_account_list(&raw);
    if accounts.is_empty() {
        warn!(path = %path.display(), "Account list is empty");
    }
    Ok(accounts)
}

fn build_fetcher(config: &TrackerConfig, secrets: &Secrets) -> Result<ScheduledFetcher> {
    let timeout = config.fetch_timeout();
    let backend: Arc<dyn Fetcher> = match config.source {
        SourceKind::Web => Arc::new(
            MirrorClient::new(secrets.mirror_base_url.as_deref(), timeout)
                .context("failed to build web client")?,
        ),
        SourceKind::Tikapi => {
            let key = secrets
                .tikapi_key
                .clone()
                .context("TIKAPI_KEY is required for source = \"tikapi\"")?;
            Arc::new(TikApiClient::new(key, timeout).context("failed to build TikAPI client")?)
        }
    };

    let policy = RetryPolicy {
        max_retries: config.max_retries,
        base_backoff: Duration::from_millis(config.backoff_base_ms),
        max_jitter: RETRY_JITTER,
    };
    Ok(ScheduledFetcher::new(
        backend,
        policy,
        config.request_delay(),
        Duration::from_millis(config.request_jitter_ms),
    ))
}

async fn run(
    config: TrackerConfig,
    mode: Option<ReportMode>,
    dry_run: bool,
    accounts: Vec<Account>,
    fetcher: ScheduledFetcher,
    notifier: Box<dyn NotifyBackend>,
) -> Result<()> {
    let file_store = JsonFileStore::new(&config.cache_file);
    let store: Box<dyn CacheStore> = if dry_run {
        // Same starting point as a real run, but nothing is written back.
        Box::new(MemoryStore::seeded(file_store.load()?))
    } else {
        Box::new(file_store)
    };
    let mut cache = DeltaCache::open(store)?;

    let tracker = Tracker::new(
        fetcher,
        urls::for_source(config.source),
        TrackerSettings::from_config(&config),
    );
    let now = Utc::now();
    let outcome = tracker.run(&accounts, &mut cache, now).await?;

    let mode = mode.unwrap_or(config.mode);
    let report = match mode {
        ReportMode::Delta => Report::delta(
            rank_deltas(outcome.records.clone(), config.top_n),
            now,
            config.label_hours,
        ),
        ReportMode::Window => Report::window(
            window_posts(
                outcome.posts(),
                now,
                config.window(),
                config.min_views,
                config.report_style,
                config.top_n,
            ),
            now,
            config.window_hours,
            config.min_views,
        ),
    }
    .with_diagnostics(&outcome.diagnostics);

    info!(run_id = %outcome.run_id, rows = report.len(), ?mode, "Report ready");
    if let Err(e) = notifier.send(&report.render()).await {
        // Observations are already committed; the next run reports from them.
        error!(backend = notifier.name(), error = %e, "Failed to send report");
    }

    info!(stats = %outcome.stats, "Run complete");
    Ok(())
}

async fn detect(
    config: &TrackerConfig,
    limit: usize,
    accounts: &[Account],
    fetcher: &ScheduledFetcher,
    notifier: &dyn NotifyBackend,
) -> Result<()> {
    let urls = urls::for_source(config.source);
    let detections = Detector::new(fetcher, urls.as_ref())
        .run(accounts, limit)
        .await;

    if let Err(e) = notifier.send(&render_detections(&detections)).await {
        error!(backend = notifier.name(), error = %e, "Failed to send detection report");
    }
    Ok(())
}
