// Tier 2: schema.org `VideoObject` markup in ld+json blocks.

use chrono::{DateTime, Utc};
use serde_json::Value;

use viewgain_common::ExtractionSource;

use super::{Extracted, ExtractionStrategy};
use crate::document::{at, count, ld_json_objects};

pub struct SemanticMarkup;

impl ExtractionStrategy for SemanticMarkup {
    fn source(&self) -> ExtractionSource {
        ExtractionSource::Semantic
    }

    // Markup describes the page's own video, so the post id is not consulted.
    fn extract(&self, document: &str, _post_id: Option<&str>) -> Option<Extracted> {
        let video = ld_json_objects(document)
            .into_iter()
            .find(|obj| type_matches(obj.get("@type"), "videoobject"))?;

        let views = interaction_count(&video, "watchaction").unwrap_or(0);
        let likes = at(&video, &["aggregateRating", "ratingCount"])
            .and_then(count)
            .or_else(|| interaction_count(&video, "likeaction"))
            .unwrap_or(0);
        let comments = video
            .get("commentCount")
            .and_then(count)
            .or_else(|| interaction_count(&video, "commentaction"))
            .unwrap_or(0);
        let created_at = video
            .get("uploadDate")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Some(Extracted {
            views,
            likes,
            comments,
            created_at,
        })
    }
}

/// `userInteractionCount` of the first statistic whose type names `action`.
fn interaction_count(video: &Value, action: &str) -> Option<u64> {
    let stats = video.get("interactionStatistic")?;
    let entries: Vec<&Value> = match stats {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    entries
        .into_iter()
        .find(|entry| {
            let kind = entry.get("interactionType");
            type_matches(kind, action)
                || type_matches(kind.and_then(|k| k.get("@type")), action)
        })
        .and_then(|entry| entry.get("userInteractionCount"))
        .and_then(count)
}

/// Case-insensitive substring match on a type string or any string in an array,
/// so `"http://schema.org/WatchAction"` and `["VideoObject"]` both count.
fn type_matches(value: Option<&Value>, needle: &str) -> bool {
    match value {
        Some(Value::String(s)) => s.to_lowercase().contains(needle),
        Some(Value::Array(items)) => items
            .iter()
            .any(|v| v.as_str().is_some_and(|s| s.to_lowercase().contains(needle))),
        _ => false,
    }
}
