// Operator probe: what does extraction see on each account's newest post?
//
// Nothing is cached. Every failure becomes a line in the output.

use tracing::{info, warn};

use viewgain_common::{Account, PostMetrics, TrackerError};

use crate::extract::{extract_metrics, merge_reading, sniff};
use crate::fetch::ScheduledFetcher;
use crate::identity::IdentityResolver;
use crate::listing::PostLister;
use crate::report::fmt_short;
use crate::urls::{public_post_url, public_profile_url, SourceUrls};

/// Findings for one handle.
#[derive(Debug, Clone)]
pub struct Detection {
    pub handle: String,
    pub outcome: DetectionOutcome,
}

#[derive(Debug, Clone)]
pub enum DetectionOutcome {
    Read {
        metrics: PostMetrics,
        sniff: Vec<String>,
        variant_sniff: Vec<String>,
    },
    NoPosts,
    Failed(String),
}

impl Detection {
    pub fn render(&self) -> String {
        let handle = &self.handle;
        match &self.outcome {
            DetectionOutcome::Read {
                metrics,
                sniff,
                variant_sniff,
            } => {
                let mut line = format!(
                    "- [@{handle}]({}): views **{}**, likes **{}**, [post]({}), source: {}",
                    public_profile_url(handle),
                    fmt_short(metrics.views),
                    fmt_short(metrics.likes),
                    metrics.url,
                    metrics.provenance(),
                );
                if !sniff.is_empty() {
                    line.push_str(&format!("\n  sniff: {}", sniff.join(" | ")));
                }
                if !variant_sniff.is_empty() {
                    line.push_str(&format!("\n  sniff (variant): {}", variant_sniff.join(" | ")));
                }
                line
            }
            DetectionOutcome::NoPosts => format!("- @{handle}: no post found on profile"),
            DetectionOutcome::Failed(message) => format!("- @{handle}: error: {message}"),
        }
    }
}

pub struct Detector<'a> {
    fetcher: &'a ScheduledFetcher,
    urls: &'a dyn SourceUrls,
}

impl<'a> Detector<'a> {
    pub fn new(fetcher: &'a ScheduledFetcher, urls: &'a dyn SourceUrls) -> Self {
        Self { fetcher, urls }
    }

    /// Probe the first `limit` accounts, one at a time.
    pub async fn run(&self, accounts: &[Account], limit: usize) -> Vec<Detection> {
        let mut out = Vec::new();
        for account in accounts.iter().take(limit) {
            let outcome = match self.probe(&account.handle).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(handle = %account.handle, error = %e, "Detection failed");
                    DetectionOutcome::Failed(e.to_string())
                }
            };
            out.push(Detection {
                handle: account.handle.clone(),
                outcome,
            });
        }
        info!(probed = out.len(), "Detection complete");
        out
    }

    async fn probe(&self, handle: &str) -> Result<DetectionOutcome, TrackerError> {
        let profile = IdentityResolver::new(self.fetcher, self.urls, true)
            .resolve(handle)
            .await?;
        let listing = PostLister::new(self.fetcher, self.urls)
            .list(handle, &profile.identity, &profile.document, 1)
            .await;
        let Some(post) = listing.posts.first() else {
            return Ok(DetectionOutcome::NoPosts);
        };

        let link = public_post_url(handle, &post.id);
        let url = self.urls.post_document(handle, &post.id);
        let document = self.fetcher.fetch(&url).await?;
        let mut metrics = extract_metrics(&document, post, &link);
        let first_sniff = sniff(&document);

        let mut variant_sniff = Vec::new();
        if metrics.views == 0 && metrics.likes == 0 {
            if let Some(variant) = self.urls.variant(&url) {
                let document = self.fetcher.fetch(&variant).await?;
                merge_reading(&mut metrics, &extract_metrics(&document, post, &link));
                variant_sniff = sniff(&document);
            }
        }

        Ok(DetectionOutcome::Read {
            metrics,
            sniff: first_sniff,
            variant_sniff,
        })
    }
}

/// The full message: a header plus one block per handle.
pub fn render_detections(detections: &[Detection]) -> String {
    let mut lines = vec![
        "**View/like detection: latest post per account**".to_string(),
        String::new(),
    ];
    lines.extend(detections.iter().map(Detection::render));
    lines.join("\n")
}
