use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Accounts ---

/// A tracked creator account. The identity is resolved fresh every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub handle: String,
    pub identity: Option<String>,
}

impl Account {
    pub fn new(handle: &str) -> Self {
        Self {
            handle: normalize_handle(handle),
            identity: None,
        }
    }
}

/// Trim whitespace and strip leading `@` markers.
pub fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_string()
}

/// Parse a newline-delimited account list. Blank lines and `#` comments are
/// skipped; repeated handles keep their first position.
pub fn parse_account_list(raw: &str) -> Vec<Account> {
    let mut seen = HashSet::new();
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Account::new)
        .filter(|account| !account.handle.is_empty())
        .filter(|account| seen.insert(account.handle.to_lowercase()))
        .collect()
}

// --- Posts ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePost {
    pub id: String,
    pub account_handle: String,
}

/// Which extraction tier produced a metrics record, most reliable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    Structured,
    Semantic,
    Heuristic,
    None,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::Semantic => write!(f, "semantic"),
            Self::Heuristic => write!(f, "heuristic"),
            Self::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    Views,
    Likes,
    Comments,
    CreatedAt,
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Views => write!(f, "views"),
            Self::Likes => write!(f, "likes"),
            Self::Comments => write!(f, "comments"),
            Self::CreatedAt => write!(f, "created_at"),
        }
    }
}

/// A field the winning tier left empty and a lower tier filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backfill {
    pub field: MetricField,
    pub source: ExtractionSource,
}

/// Normalized engagement metrics for one post.
///
/// A record with `extraction_source == None` carries all-zero counters that
/// mean "unknown", not "no engagement".
#[derive(Debug, Clone, PartialEq)]
pub struct PostMetrics {
    pub id: String,
    pub url: String,
    pub account_handle: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub extraction_source: ExtractionSource,
    pub backfilled: Vec<Backfill>,
}

impl PostMetrics {
    /// The record returned when every extraction tier came up empty.
    pub fn unextracted(id: &str, url: &str, account_handle: &str) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            account_handle: account_handle.to_string(),
            views: 0,
            likes: 0,
            comments: 0,
            created_at: None,
            extraction_source: ExtractionSource::None,
            backfilled: Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.extraction_source == ExtractionSource::None
    }

    /// Tier provenance such as `structured` or `semantic+heuristic`.
    pub fn provenance(&self) -> String {
        let mut parts = vec![self.extraction_source.to_string()];
        for b in &self.backfilled {
            let tag = b.source.to_string();
            if !parts.contains(&tag) {
                parts.push(tag);
            }
        }
        parts.join("+")
    }
}

// --- Delta tracking ---

/// Last observation of a post, as persisted between runs.
///
/// `views` / `updatedAt` are accepted so cache files written by the earlier
/// tracker scripts load unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(alias = "views")]
    pub last_views: u64,
    /// Epoch milliseconds.
    #[serde(alias = "updatedAt", default)]
    pub last_updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaRecord {
    pub post: PostMetrics,
    pub previous_views: u64,
    pub gained: u64,
}
