// Helpers for pulling machine-readable payloads out of fetched documents.
//
// A document is either a page (HTML with embedded JSON in script tags) or an
// API response (a bare JSON body). Everything here is pure and infallible:
// malformed blobs are skipped, never reported.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Script tags whose body is the page's full client state.
static STATE_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<script[^>]*\bid\s*=\s*["'](SIGI_STATE|__UNIVERSAL_DATA_FOR_REHYDRATION__|__NEXT_DATA__)["'][^>]*>(.*?)</script>"#,
    )
    .expect("valid regex")
});

static LD_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<script[^>]*\btype\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#,
    )
    .expect("valid regex")
});

/// Every parseable state blob in the document, the bare-JSON body first.
pub fn state_blobs(document: &str) -> Vec<Value> {
    let mut blobs = Vec::new();

    let trimmed = document.trim_start();
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            blobs.push(value);
        }
    }

    for cap in STATE_SCRIPT_RE.captures_iter(document) {
        if let Ok(value) = serde_json::from_str::<Value>(cap[2].trim()) {
            blobs.push(value);
        }
    }

    blobs
}

/// Every object found in `application/ld+json` blocks, with top-level arrays
/// and `@graph` members flattened out.
pub fn ld_json_objects(document: &str) -> Vec<Value> {
    let mut objects = Vec::new();
    for cap in LD_JSON_RE.captures_iter(document) {
        let Ok(value) = serde_json::from_str::<Value>(cap[1].trim()) else {
            continue;
        };
        flatten_ld(value, &mut objects);
    }
    objects
}

fn flatten_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_ld(item, out);
            }
        }
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_ld(graph, out);
            }
            if !map.is_empty() {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// Walk nested object keys.
pub fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

/// First present key among aliases.
pub fn first_of<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| value.get(*k).filter(|v| !v.is_null()))
}

/// A non-negative count from a JSON number or numeric string ("1,204", "2.1K").
pub fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => crate::extract::heuristic::parse_count(s),
        _ => None,
    }
}

/// A raw integer timestamp from a JSON number or digit string.
pub fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A JSON string or number rendered as an identifier.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
