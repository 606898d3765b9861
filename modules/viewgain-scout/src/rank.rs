// Deterministic ordering for the two report modes.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use viewgain_common::{DeltaRecord, PostMetrics, ReportStyle};

/// Delta mode: posts that gained views, biggest gain first. Ties go to the
/// newer post (unknown creation time last), then to the smaller id.
pub fn rank_deltas(records: Vec<DeltaRecord>, top_n: usize) -> Vec<DeltaRecord> {
    let mut kept: Vec<DeltaRecord> = records.into_iter().filter(|r| r.gained > 0).collect();
    kept.sort_by(|a, b| {
        b.gained
            .cmp(&a.gained)
            .then_with(|| newest_first(&a.post, &b.post))
            .then_with(|| a.post.id.cmp(&b.post.id))
    });
    kept.truncate(top_n);
    kept
}

/// Window mode: posts created within `window` of `now` with at least
/// `min_views`. Posts with unknown creation time are never included.
pub fn window_posts(
    posts: Vec<PostMetrics>,
    now: DateTime<Utc>,
    window: Duration,
    min_views: u64,
    style: ReportStyle,
    top_n: usize,
) -> Vec<PostMetrics> {
    let cutoff = now
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut kept: Vec<PostMetrics> = posts
        .into_iter()
        .filter(|p| p.created_at.is_some_and(|t| t >= cutoff && t <= now))
        .filter(|p| p.views >= min_views)
        .collect();

    kept.sort_by(|a, b| {
        let primary = match style {
            ReportStyle::TopViews => b.views.cmp(&a.views),
            ReportStyle::Newest => newest_first(a, b),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });
    kept.truncate(top_n);
    kept
}

fn newest_first(a: &PostMetrics, b: &PostMetrics) -> Ordering {
    // `None < Some`, so reversing puts unknown creation times last.
    b.created_at.cmp(&a.created_at)
}
