// Tier 1: the embedded client-state blob.
//
// Page state keeps posts in a keyed map (`ItemModule`); item-detail and API
// responses carry a single `itemInfo.itemStruct` or an ordered item array.

use chrono::DateTime;
use serde_json::{Map, Value};

use viewgain_common::ExtractionSource;

use super::{normalize_epoch_ms, Extracted, ExtractionStrategy};
use crate::document::{at, count, first_of, id_string, integer, state_blobs};

const VIEW_KEYS: &[&str] = &["playCount", "viewCount", "play_count", "view_count"];
const LIKE_KEYS: &[&str] = &["diggCount", "likeCount", "digg_count", "like_count"];
const COMMENT_KEYS: &[&str] = &["commentCount", "comment_count"];
const CREATED_KEYS: &[&str] = &["createTime", "create_time", "create_time_ms"];
const STATS_KEYS: &[&str] = &["stats", "statsV2", "statistics"];

/// Arrays of post objects, in the order the upstream returned them.
pub(crate) const ITEM_ARRAY_KEYS: &[&str] = &["itemList", "items", "aweme_list"];

pub struct StructuredState;

impl ExtractionStrategy for StructuredState {
    fn source(&self) -> ExtractionSource {
        ExtractionSource::Structured
    }

    fn extract(&self, document: &str, post_id: Option<&str>) -> Option<Extracted> {
        state_blobs(document)
            .iter()
            .filter_map(|blob| find_item(blob, post_id, Match::Lenient))
            .find_map(metrics_from_item)
    }
}

/// How a post object is matched against the wanted id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    /// A post document: its lone entry is taken even when keyed differently.
    Lenient,
    /// A profile or listing document: only an entry carrying the id counts.
    Exact,
}

/// Counters for `post_id` from a document that holds many posts.
pub fn extract_listed(document: &str, post_id: &str) -> Option<Extracted> {
    state_blobs(document)
        .iter()
        .filter_map(|blob| find_item(blob, Some(post_id), Match::Exact))
        .find_map(metrics_from_item)
}

/// The post object for `post_id` in any of the known state shapes.
fn find_item<'a>(blob: &'a Value, post_id: Option<&str>, mode: Match) -> Option<&'a Value> {
    if let Some(Value::Object(module)) = blob.get("ItemModule") {
        if let Some(item) = pick_from_module(module, post_id, mode) {
            return Some(item);
        }
    }

    let singles = [
        at(blob, &["itemInfo", "itemStruct"]),
        at(blob, &["__DEFAULT_SCOPE__", "webapp.video-detail", "itemInfo", "itemStruct"]),
        blob.get("aweme_detail"),
    ];
    for item in singles.into_iter().flatten() {
        let matches = match (post_id, item_id(item)) {
            (Some(wanted), Some(found)) => wanted == found,
            (Some(_), None) => mode == Match::Lenient,
            (None, _) => true,
        };
        if matches {
            return Some(item);
        }
    }

    ITEM_ARRAY_KEYS
        .iter()
        .filter_map(|key| blob.get(*key).and_then(Value::as_array))
        .find_map(|items| pick_from_list(items, post_id, mode))
}

fn pick_from_module<'a>(
    module: &'a Map<String, Value>,
    post_id: Option<&str>,
    mode: Match,
) -> Option<&'a Value> {
    if let Some(wanted) = post_id {
        if let Some(item) = module.get(wanted) {
            return Some(item);
        }
        if let Some(item) = module.values().find(|v| item_id(v).as_deref() == Some(wanted)) {
            return Some(item);
        }
        // A post page's state holds only that post, sometimes keyed differently.
        return match (mode, module.len()) {
            (Match::Lenient, 1) => module.values().next(),
            _ => None,
        };
    }
    module
        .values()
        .max_by_key(|item| created_ms(item).unwrap_or(0))
}

fn pick_from_list<'a>(items: &'a [Value], post_id: Option<&str>, mode: Match) -> Option<&'a Value> {
    match post_id {
        Some(wanted) => items
            .iter()
            .find(|item| item_id(item).as_deref() == Some(wanted))
            .or_else(|| match (mode, items) {
                (Match::Lenient, [only]) => Some(only),
                _ => None,
            }),
        None => items.first(),
    }
}

/// Counters from a post object. An object without any counter is not a record.
fn metrics_from_item(item: &Value) -> Option<Extracted> {
    let sources: Vec<&Value> = STATS_KEYS
        .iter()
        .filter_map(|k| item.get(*k))
        .chain(std::iter::once(item))
        .collect();

    let views = read_counter(&sources, VIEW_KEYS);
    let likes = read_counter(&sources, LIKE_KEYS);
    let comments = read_counter(&sources, COMMENT_KEYS);
    if views.is_none() && likes.is_none() && comments.is_none() {
        return None;
    }

    Some(Extracted {
        views: views.unwrap_or(0),
        likes: likes.unwrap_or(0),
        comments: comments.unwrap_or(0),
        created_at: created_ms(item).and_then(DateTime::from_timestamp_millis),
    })
}

fn read_counter(sources: &[&Value], keys: &[&str]) -> Option<u64> {
    sources
        .iter()
        .find_map(|s| first_of(s, keys).and_then(count))
}

/// Post identifier under any of the upstream spellings.
pub(crate) fn item_id(item: &Value) -> Option<String> {
    first_of(item, &["id", "aweme_id", "awemeId"])
        .or_else(|| at(item, &["video", "id"]))
        .and_then(id_string)
}

/// Creation time in epoch milliseconds, whichever unit upstream used.
pub(crate) fn created_ms(item: &Value) -> Option<i64> {
    first_of(item, CREATED_KEYS)
        .and_then(integer)
        .and_then(normalize_epoch_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    fn sigi(body: &str) -> String {
        format!(r#"<html><script id="SIGI_STATE" type="application/json">{body}</script></html>"#)
    }

    #[test]
    fn reads_item_module_entry_by_id() {
        let doc = sigi(
            r#"{"ItemModule":{
                "111":{"id":"111","createTime":"1700000000","stats":{"playCount":5000,"diggCount":300,"commentCount":12}},
                "222":{"id":"222","createTime":"1700003600","stats":{"playCount":10,"diggCount":1,"commentCount":0}}
            }}"#,
        );
        let m = StructuredState.extract(&doc, Some("111")).unwrap();
        assert_eq!((m.views, m.likes, m.comments), (5000, 300, 12));
        assert_eq!(m.created_at, Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
    }

    #[test]
    fn unknown_id_in_multi_entry_module_is_not_guessed() {
        let doc = sigi(r#"{"ItemModule":{"1":{"stats":{"playCount":1}},"2":{"stats":{"playCount":2}}}}"#);
        assert!(StructuredState.extract(&doc, Some("999")).is_none());
    }

    #[test]
    fn listed_counters_need_the_exact_id() {
        let doc = sigi(
            r#"{"ItemList":{"user-post":{"list":["111","222"]}},
                "ItemModule":{"111":{"id":"111","stats":{"playCount":90000}}}}"#,
        );
        assert_eq!(extract_listed(&doc, "111").unwrap().views, 90000);
        assert!(extract_listed(&doc, "222").is_none());
        // The same lone entry is still taken from a post document.
        assert_eq!(StructuredState.extract(&doc, Some("222")).unwrap().views, 90000);

        let api = r#"{"itemList":[{"id":"a1","stats":{"playCount":40}}]}"#;
        assert!(extract_listed(api, "a2").is_none());
    }

    #[test]
    fn without_id_newest_module_entry_wins() {
        let doc = sigi(
            r#"{"ItemModule":{
                "1":{"createTime":100,"stats":{"playCount":1}},
                "2":{"createTime":300,"stats":{"playCount":2}}
            }}"#,
        );
        assert_eq!(StructuredState.extract(&doc, None).unwrap().views, 2);
    }

    #[test]
    fn api_item_struct_with_string_counters() {
        let body = r#"{"status":"success","itemInfo":{"itemStruct":{
            "id":"73","createTime":1700000000,
            "statsV2":{"playCount":"12345","diggCount":"678","commentCount":"9"}}}}"#;
        let m = StructuredState.extract(body, Some("73")).unwrap();
        assert_eq!((m.views, m.likes, m.comments), (12345, 678, 9));
    }

    #[test]
    fn api_listing_array_aliases() {
        let body = r#"{"aweme_list":[
            {"aweme_id":"a1","create_time":1700000000,"statistics":{"play_count":40,"digg_count":4,"comment_count":1}},
            {"aweme_id":"a2","create_time":1700000100,"statistics":{"view_count":90,"like_count":9}}
        ]}"#;
        let m = StructuredState.extract(body, Some("a2")).unwrap();
        assert_eq!((m.views, m.likes, m.comments), (90, 9, 0));
    }

    #[test]
    fn item_without_counters_is_not_a_record() {
        let doc = sigi(r#"{"ItemModule":{"5":{"id":"5","desc":"hello"}}}"#);
        assert!(StructuredState.extract(&doc, Some("5")).is_none());
    }

    #[test]
    fn absent_blob_yields_nothing() {
        assert!(StructuredState.extract("<html></html>", Some("1")).is_none());
    }
}
