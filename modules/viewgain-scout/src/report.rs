// Report text, as posted to the notifier.

use chrono::{DateTime, Utc};

use viewgain_common::{DeltaRecord, PostMetrics};

use crate::pipeline::Diagnostic;
use crate::urls::public_profile_url;

#[derive(Debug, Clone)]
pub enum ReportRows {
    Delta(Vec<DeltaRecord>),
    Window(Vec<PostMetrics>),
}

/// A ranked report for one run. Rendered once, never persisted.
#[derive(Debug, Clone)]
pub struct Report {
    pub rows: ReportRows,
    pub diagnostics: Vec<String>,
    pub generated_at: DateTime<Utc>,
    /// Hours shown in the delta header (the run cadence).
    pub label_hours: u32,
    pub window_hours: u32,
    pub min_views: u64,
}

impl Report {
    pub fn delta(records: Vec<DeltaRecord>, generated_at: DateTime<Utc>, label_hours: u32) -> Self {
        Self {
            rows: ReportRows::Delta(records),
            diagnostics: Vec::new(),
            generated_at,
            label_hours,
            window_hours: 0,
            min_views: 0,
        }
    }

    pub fn window(
        posts: Vec<PostMetrics>,
        generated_at: DateTime<Utc>,
        window_hours: u32,
        min_views: u64,
    ) -> Self {
        Self {
            rows: ReportRows::Window(posts),
            diagnostics: Vec::new(),
            generated_at,
            label_hours: window_hours,
            window_hours,
            min_views,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: &[Diagnostic]) -> Self {
        self.diagnostics = diagnostics.iter().map(ToString::to_string).collect();
        self
    }

    pub fn len(&self) -> usize {
        match &self.rows {
            ReportRows::Delta(rows) => rows.len(),
            ReportRows::Window(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn render(&self) -> String {
        let now = self.generated_at;
        let mut blocks: Vec<String> = Vec::new();

        match &self.rows {
            ReportRows::Delta(rows) => {
                blocks.push(format!("**Check Notification (last {}H)**", self.label_hours));
                if rows.is_empty() {
                    blocks.push("No posts gained views since last check.".to_string());
                }
                for (i, record) in rows.iter().enumerate() {
                    blocks.push(format!(
                        "{}. Post gained {} views\n{}\n{}",
                        i + 1,
                        fmt_short(record.gained),
                        link_line(&record.post),
                        posted_line(&record.post, now),
                    ));
                }
            }
            ReportRows::Window(rows) => {
                blocks.push(format!("**Top Posts (last {}H)**", self.window_hours));
                if rows.is_empty() {
                    blocks.push(format!(
                        "No posts in the last {}H above {} views.",
                        self.window_hours,
                        fmt_short(self.min_views)
                    ));
                }
                for (i, post) in rows.iter().enumerate() {
                    blocks.push(format!(
                        "{}. {} views\n{}\n{}",
                        i + 1,
                        fmt_short(post.views),
                        link_line(post),
                        posted_line(post, now),
                    ));
                }
            }
        }

        if !self.diagnostics.is_empty() {
            let lines: Vec<String> = self.diagnostics.iter().map(|d| format!("- {d}")).collect();
            blocks.push(format!("Diagnostics:\n{}", lines.join("\n")));
        }

        blocks.join("\n\n")
    }
}

fn link_line(post: &PostMetrics) -> String {
    format!(
        "[Post Link]({}) | [@{}]({}) | {} views | {} likes | {} coms.",
        post.url,
        post.account_handle,
        public_profile_url(&post.account_handle),
        fmt_short(post.views),
        fmt_short(post.likes),
        fmt_short(post.comments),
    )
}

fn posted_line(post: &PostMetrics, now: DateTime<Utc>) -> String {
    match post.created_at {
        Some(t) => format!("posted {}", ago(now, t)),
        None => "posted".to_string(),
    }
}

/// `300K`, `8.2M`, `1.5B`; one decimal with a trailing `.0` dropped.
pub fn fmt_short(n: u64) -> String {
    let (scaled, suffix) = match n {
        1_000_000_000.. => (n as f64 / 1e9, "B"),
        1_000_000.. => (n as f64 / 1e6, "M"),
        1_000.. => (n as f64 / 1e3, "K"),
        _ => return n.to_string(),
    };
    let text = format!("{scaled:.1}");
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{text}{suffix}")
}

/// Coarsest non-zero unit: `3 day(s) ago`, `5 hour(s) ago`, `12 min(s) ago`,
/// or `just now`. Future timestamps read as `just now`.
pub fn ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    let days = secs / 86_400;
    if days > 0 {
        return format!("{days} day(s) ago");
    }
    let hours = (secs % 86_400) / 3_600;
    if hours > 0 {
        return format!("{hours} hour(s) ago");
    }
    let mins = (secs % 3_600) / 60;
    if mins > 0 {
        return format!("{mins} min(s) ago");
    }
    "just now".to_string()
}
