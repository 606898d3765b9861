// Identity -> recent candidate posts, newest first.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use viewgain_common::CandidatePost;

use crate::document::{at, id_string, state_blobs};
use crate::extract::structured::{created_ms, item_id, ITEM_ARRAY_KEYS};
use crate::fetch::ScheduledFetcher;
use crate::urls::SourceUrls;

static BARE_VIDEO_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/video/(\d{8,})").expect("valid regex"));

/// How the order of a listing was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOrder {
    /// Upstream gave an ordered list.
    Explicit,
    /// Keyed map sorted by creation time.
    ByCreateTime,
    /// Links scraped from raw text, in first-seen order.
    Scanned,
    Empty,
}

/// Candidate post ids found in a document, truncated to `max_count`.
pub fn list_from_document(
    document: &str,
    handle: &str,
    max_count: usize,
) -> (Vec<CandidatePost>, ListingOrder) {
    let blobs = state_blobs(document);

    let (ids, order) = if let Some(ids) = blobs.iter().find_map(explicit_ids) {
        (ids, ListingOrder::Explicit)
    } else if let Some(ids) = blobs.iter().find_map(module_ids) {
        (ids, ListingOrder::ByCreateTime)
    } else {
        (scan_links(document, handle), ListingOrder::Scanned)
    };

    let mut seen = HashSet::new();
    let posts: Vec<CandidatePost> = ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .take(max_count)
        .map(|id| CandidatePost {
            id,
            account_handle: handle.to_string(),
        })
        .collect();

    let order = if posts.is_empty() { ListingOrder::Empty } else { order };
    (posts, order)
}

fn explicit_ids(blob: &Value) -> Option<Vec<String>> {
    if let Some(list) = at(blob, &["ItemList", "user-post", "list"]).and_then(Value::as_array) {
        let ids: Vec<String> = list.iter().filter_map(id_string).collect();
        if !ids.is_empty() {
            return Some(ids);
        }
    }

    ITEM_ARRAY_KEYS
        .iter()
        .filter_map(|key| blob.get(*key).and_then(Value::as_array))
        .map(|items| items.iter().filter_map(item_id).collect::<Vec<_>>())
        .find(|ids| !ids.is_empty())
}

fn module_ids(blob: &Value) -> Option<Vec<String>> {
    let Some(Value::Object(module)) = blob.get("ItemModule") else {
        return None;
    };
    let mut entries: Vec<(i64, String)> = module
        .iter()
        .map(|(key, item)| (created_ms(item).unwrap_or(0), item_id(item).unwrap_or_else(|| key.clone())))
        .collect();
    if entries.is_empty() {
        return None;
    }
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Some(entries.into_iter().map(|(_, id)| id).collect())
}

fn scan_links(document: &str, handle: &str) -> Vec<String> {
    let own = Regex::new(&format!(r"(?i)/@{}/video/(\d{{8,}})", regex::escape(handle))).ok();
    let mut ids: Vec<String> = own
        .iter()
        .flat_map(|re| re.captures_iter(document).map(|c| c[1].to_string()))
        .collect();
    if ids.is_empty() {
        ids = BARE_VIDEO_LINK_RE
            .captures_iter(document)
            .map(|c| c[1].to_string())
            .collect();
    }
    ids
}

/// A listing plus the document it was read from, so counters embedded in the
/// listing can be reused.
#[derive(Debug, Clone)]
pub struct Listing {
    pub posts: Vec<CandidatePost>,
    pub order: ListingOrder,
    pub document: String,
}

pub struct PostLister<'a> {
    fetcher: &'a ScheduledFetcher,
    urls: &'a dyn SourceUrls,
}

impl<'a> PostLister<'a> {
    pub fn new(fetcher: &'a ScheduledFetcher, urls: &'a dyn SourceUrls) -> Self {
        Self { fetcher, urls }
    }

    /// List from the source's listing endpoint, falling back to the profile
    /// document when that fails or lists nothing. Never an error: an account
    /// with no posts is an empty listing.
    pub async fn list(
        &self,
        handle: &str,
        identity: &str,
        profile_document: &str,
        max_count: usize,
    ) -> Listing {
        if let Some(url) = self.urls.listing(identity, max_count) {
            match self.fetcher.fetch(&url).await {
                Ok(document) => {
                    let (posts, order) = list_from_document(&document, handle, max_count);
                    if !posts.is_empty() {
                        debug!(handle, posts = posts.len(), ?order, "Listed from endpoint");
                        return Listing {
                            posts,
                            order,
                            document,
                        };
                    }
                    debug!(handle, "Listing endpoint returned no posts, using profile");
                }
                Err(e) => warn!(handle, error = %e, "Listing fetch failed, using profile"),
            }
        }

        let (posts, order) = list_from_document(profile_document, handle, max_count);
        debug!(handle, posts = posts.len(), ?order, "Listed from profile");
        Listing {
            posts,
            order,
            document: profile_document.to_string(),
        }
    }
}
