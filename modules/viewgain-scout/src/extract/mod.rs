//! Metrics extraction: a chain of strategies over a fetched post document.
//!
//! Each tier is a pure `document -> Option<Extracted>` function. The first
//! tier that yields a record wins; lower tiers may only fill fields the
//! winner left at zero (or, for the creation time, unknown).

pub mod heuristic;
pub mod semantic;
pub mod structured;

use chrono::{DateTime, Utc};

use viewgain_common::{Backfill, CandidatePost, ExtractionSource, MetricField, PostMetrics};

pub use heuristic::{parse_count, sniff, HeuristicScan};
pub use semantic::SemanticMarkup;
pub use structured::{extract_listed, StructuredState};

/// Raw epoch values above this are already milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 2_000_000_000;

/// Metrics as read by a single tier, before provenance is attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub created_at: Option<DateTime<Utc>>,
}

pub trait ExtractionStrategy: Send + Sync {
    fn source(&self) -> ExtractionSource;

    /// Read metrics for `post_id` (or the document's only post when `None`).
    /// Returns `None` when this encoding is absent or unusable.
    fn extract(&self, document: &str, post_id: Option<&str>) -> Option<Extracted>;
}

/// Tiers in decreasing order of reliability.
pub const CHAIN: &[&dyn ExtractionStrategy] = &[&StructuredState, &SemanticMarkup, &HeuristicScan];

/// Run the full chain for one post.
pub fn extract_metrics(document: &str, post: &CandidatePost, url: &str) -> PostMetrics {
    let mut metrics = PostMetrics::unextracted(&post.id, url, &post.account_handle);

    let Some(winner) = CHAIN
        .iter()
        .position(|tier| apply_primary(&mut metrics, *tier, document, &post.id))
    else {
        return metrics;
    };

    for tier in &CHAIN[winner + 1..] {
        if missing_fields(&metrics).is_empty() {
            break;
        }
        if let Some(lower) = tier.extract(document, Some(post.id.as_str())) {
            backfill(&mut metrics, &lower, tier.source());
        }
    }

    metrics
}

/// Counters embedded in a listing or profile document. Only an entry
/// carrying this post's id is used.
pub fn extract_structured(document: &str, post: &CandidatePost, url: &str) -> Option<PostMetrics> {
    let found = extract_listed(document, &post.id)?;
    let mut metrics = PostMetrics::unextracted(&post.id, url, &post.account_handle);
    fill_primary(&mut metrics, found, ExtractionSource::Structured);
    Some(metrics)
}

fn apply_primary(
    metrics: &mut PostMetrics,
    tier: &dyn ExtractionStrategy,
    document: &str,
    post_id: &str,
) -> bool {
    let Some(found) = tier.extract(document, Some(post_id)) else {
        return false;
    };
    fill_primary(metrics, found, tier.source());
    true
}

fn fill_primary(metrics: &mut PostMetrics, found: Extracted, source: ExtractionSource) {
    metrics.views = found.views;
    metrics.likes = found.likes;
    metrics.comments = found.comments;
    metrics.created_at = found.created_at;
    metrics.extraction_source = source;
}

fn missing_fields(metrics: &PostMetrics) -> Vec<MetricField> {
    let mut missing = Vec::new();
    if metrics.views == 0 {
        missing.push(MetricField::Views);
    }
    if metrics.likes == 0 {
        missing.push(MetricField::Likes);
    }
    if metrics.comments == 0 {
        missing.push(MetricField::Comments);
    }
    if metrics.created_at.is_none() {
        missing.push(MetricField::CreatedAt);
    }
    missing
}

/// Fill empty fields of `metrics` from a lower-confidence reading.
/// Populated fields are never touched.
pub fn backfill(metrics: &mut PostMetrics, lower: &Extracted, source: ExtractionSource) {
    for field in missing_fields(metrics) {
        let filled = match field {
            MetricField::Views if lower.views > 0 => {
                metrics.views = lower.views;
                true
            }
            MetricField::Likes if lower.likes > 0 => {
                metrics.likes = lower.likes;
                true
            }
            MetricField::Comments if lower.comments > 0 => {
                metrics.comments = lower.comments;
                true
            }
            MetricField::CreatedAt if lower.created_at.is_some() => {
                metrics.created_at = lower.created_at;
                true
            }
            _ => false,
        };
        if filled {
            metrics.backfilled.push(Backfill { field, source });
        }
    }
}

/// Merge a second reading of the same post (e.g. a URL variant) into the first.
/// A degraded first reading is replaced outright.
pub fn merge_reading(metrics: &mut PostMetrics, other: &PostMetrics) {
    if other.is_degraded() {
        return;
    }
    if metrics.is_degraded() {
        let url = std::mem::take(&mut metrics.url);
        *metrics = other.clone();
        metrics.url = url;
        return;
    }
    let lower = Extracted {
        views: other.views,
        likes: other.likes,
        comments: other.comments,
        created_at: other.created_at,
    };
    backfill(metrics, &lower, other.extraction_source);
}

/// Normalize an epoch that may be in seconds or milliseconds to milliseconds.
/// Zero and negative values mean "unknown".
pub fn normalize_epoch_ms(raw: i64) -> Option<i64> {
    if raw <= 0 {
        return None;
    }
    if raw > EPOCH_MILLIS_THRESHOLD {
        Some(raw)
    } else {
        Some(raw * 1000)
    }
}

pub fn timestamp_from_epoch(raw: i64) -> Option<DateTime<Utc>> {
    normalize_epoch_ms(raw).and_then(DateTime::from_timestamp_millis)
}
