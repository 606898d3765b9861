//! One tracker run: for every account resolve, list, read each post, then
//! apply the observations to the delta cache.
//!
//! Account workers never touch the cache. Each returns its readings and the
//! aggregating loop commits them once the account has finished, so an account
//! abandoned mid-way writes nothing.

pub mod diagnostics;
pub mod stats;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use stats::RunStats;

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use viewgain_common::{
    Account, CandidatePost, DeltaRecord, FetchError, PostMetrics, Result, TrackerConfig,
    TrackerError,
};

use crate::cache::DeltaCache;
use crate::extract::{extract_metrics, extract_structured, merge_reading};
use crate::fetch::ScheduledFetcher;
use crate::identity::IdentityResolver;
use crate::listing::PostLister;
use crate::urls::{public_post_url, SourceUrls};

#[derive(Debug, Clone, TypedBuilder)]
pub struct TrackerSettings {
    #[builder(default = 30)]
    pub max_posts_per_account: usize,
    #[builder(default = true)]
    pub reuse_listing_metrics: bool,
    #[builder(default = true)]
    pub variant_fallback: bool,
    #[builder(default = 1)]
    pub workers: usize,
    #[builder(default)]
    pub run_budget: Option<Duration>,
}

impl TrackerSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::builder()
            .max_posts_per_account(config.max_posts_per_account as usize)
            .reuse_listing_metrics(config.reuse_listing_metrics)
            .variant_fallback(config.variant_fallback)
            .workers(config.workers())
            .run_budget(config.run_budget())
            .build()
    }
}

/// What one account worker read. Applied to the cache by the caller.
#[derive(Debug)]
struct AccountOutcome {
    handle: String,
    status: AccountStatus,
    listed: usize,
    readings: Vec<PostMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountStatus {
    Done,
    Failed,
    Skipped,
}

/// Everything a run produced, before ranking.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    /// One record per observed post, in commit order.
    pub records: Vec<DeltaRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: RunStats,
}

impl RunOutcome {
    /// Observed posts, for window-mode reports.
    pub fn posts(&self) -> Vec<PostMetrics> {
        self.records.iter().map(|r| r.post.clone()).collect()
    }
}

pub struct Tracker {
    fetcher: ScheduledFetcher,
    urls: Box<dyn SourceUrls>,
    settings: TrackerSettings,
    diagnostics: Diagnostics,
}

impl Tracker {
    pub fn new(fetcher: ScheduledFetcher, urls: Box<dyn SourceUrls>, settings: TrackerSettings) -> Self {
        Self {
            fetcher,
            urls,
            settings,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Process every account, commit observations, flush the cache once.
    /// Only a cache flush failure is an error; everything per-account or
    /// per-post becomes a diagnostic.
    pub async fn run(
        &self,
        accounts: &[Account],
        cache: &mut DeltaCache,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let workers = self.settings.workers.max(1);
        let deadline = self.settings.run_budget.map(|b| Instant::now() + b);
        info!(run_id = %run_id, accounts = accounts.len(), workers, "Tracker run starting");

        let mut stats = RunStats::default();
        let mut records = Vec::new();
        let mut observed: HashSet<String> = HashSet::new();

        let mut outcomes = stream::iter(accounts)
            .map(|account| async move {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return self.skip(account);
                }
                self.process_account(account).await
            })
            .buffer_unordered(workers);

        while let Some(outcome) = outcomes.next().await {
            match outcome.status {
                AccountStatus::Done => stats.accounts_processed += 1,
                AccountStatus::Failed => stats.accounts_failed += 1,
                AccountStatus::Skipped => stats.accounts_skipped += 1,
            }
            stats.posts_listed += outcome.listed as u64;

            for reading in outcome.readings {
                if reading.is_degraded() {
                    stats.posts_degraded += 1;
                    self.diagnostics.push(Diagnostic::post(
                        &outcome.handle,
                        &reading.id,
                        DiagnosticKind::ExtractionDegraded,
                        "no metrics found in document",
                    ));
                    continue;
                }
                if !observed.insert(reading.id.clone()) {
                    debug!(post_id = %reading.id, "Post already observed this run");
                    continue;
                }
                let record = cache.observe(reading, now);
                stats.posts_observed += 1;
                if record.gained > 0 {
                    stats.posts_gained += 1;
                }
                records.push(record);
            }
        }
        drop(outcomes);

        cache.flush()?;

        let counters = self.fetcher.counters();
        stats.fetch_attempts = counters.attempts();
        stats.fetch_retries = counters.retries();

        info!(run_id = %run_id, %stats, "Tracker run complete");

        Ok(RunOutcome {
            run_id,
            records,
            diagnostics: self.diagnostics.take(),
            stats,
        })
    }

    fn skip(&self, account: &Account) -> AccountOutcome {
        warn!(handle = %account.handle, "Run budget exhausted, skipping account");
        self.diagnostics.push(Diagnostic::account(
            &account.handle,
            DiagnosticKind::BudgetExhausted,
            "skipped (run budget exhausted)",
        ));
        AccountOutcome {
            handle: account.handle.clone(),
            status: AccountStatus::Skipped,
            listed: 0,
            readings: Vec::new(),
        }
    }

    async fn process_account(&self, account: &Account) -> AccountOutcome {
        let handle = account.handle.as_str();
        let mut outcome = AccountOutcome {
            handle: handle.to_string(),
            status: AccountStatus::Failed,
            listed: 0,
            readings: Vec::new(),
        };

        let resolver =
            IdentityResolver::new(&self.fetcher, self.urls.as_ref(), self.settings.variant_fallback);
        let profile = match resolver.resolve(handle).await {
            Ok(profile) => profile,
            Err(e) => {
                let kind = match e {
                    TrackerError::IdentityNotFound { .. } => DiagnosticKind::IdentityNotFound,
                    _ => DiagnosticKind::FetchFailed,
                };
                warn!(handle, error = %e, "Account skipped");
                self.diagnostics
                    .push(Diagnostic::account(handle, kind, e.to_string()));
                return outcome;
            }
        };

        let lister = PostLister::new(&self.fetcher, self.urls.as_ref());
        let listing = lister
            .list(
                handle,
                &profile.identity,
                &profile.document,
                self.settings.max_posts_per_account,
            )
            .await;
        outcome.listed = listing.posts.len();
        if listing.posts.is_empty() {
            info!(handle, "No posts listed");
            self.diagnostics.push(Diagnostic::account(
                handle,
                DiagnosticKind::NoPosts,
                "no posts returned",
            ));
        }

        for post in &listing.posts {
            match self.read_post(post, &listing.document).await {
                Ok(metrics) => {
                    debug!(
                        handle,
                        post_id = %post.id,
                        views = metrics.views,
                        source = %metrics.provenance(),
                        "Post read"
                    );
                    outcome.readings.push(metrics);
                }
                Err(e) => {
                    self.diagnostics.push(Diagnostic::post(
                        handle,
                        &post.id,
                        DiagnosticKind::FetchFailed,
                        e.to_string(),
                    ));
                }
            }
        }

        info!(handle, listed = outcome.listed, read = outcome.readings.len(), "Account done");
        outcome.status = AccountStatus::Done;
        outcome
    }

    /// Metrics for one post: listing counters when available, otherwise the
    /// post document, with one variant retry when that comes up short.
    async fn read_post(
        &self,
        post: &CandidatePost,
        listing_document: &str,
    ) -> std::result::Result<PostMetrics, FetchError> {
        let link = public_post_url(&post.account_handle, &post.id);

        if self.settings.reuse_listing_metrics {
            if let Some(metrics) = extract_structured(listing_document, post, &link) {
                return Ok(metrics);
            }
        }

        let url = self.urls.post_document(&post.account_handle, &post.id);
        let document = self.fetcher.fetch(&url).await?;
        let mut metrics = extract_metrics(&document, post, &link);

        let short = metrics.is_degraded() || (metrics.views == 0 && metrics.likes == 0);
        if short && self.settings.variant_fallback {
            if let Some(variant) = self.urls.variant(&url) {
                match self.fetcher.fetch(&variant).await {
                    Ok(doc) => merge_reading(&mut metrics, &extract_metrics(&doc, post, &link)),
                    Err(e) => debug!(url = %variant, error = %e, "Variant fetch failed"),
                }
            }
        }

        Ok(metrics)
    }
}
