// Tier 3: ordered text probes over the raw document.

use std::sync::LazyLock;

use regex::Regex;

use viewgain_common::{ExtractionSource, MetricField};

use super::{timestamp_from_epoch, Extracted, ExtractionStrategy};

static ABBREV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([\d,.]+)\s*([KMB])?$").expect("valid regex"));

/// A pattern tried against the document for one field. Group 1 holds the value.
pub struct Probe {
    pub field: MetricField,
    pub label: &'static str,
    pub pattern: Regex,
}

fn probe(field: MetricField, label: &'static str, pattern: &str) -> Probe {
    Probe {
        field,
        label,
        pattern: Regex::new(pattern).expect("valid regex"),
    }
}

/// Probes in declared order; for each field the first match wins.
pub static PROBES: LazyLock<Vec<Probe>> = LazyLock::new(|| {
    const NUM: &str = r"(\d[\d,.]*\s?[KMB]?)";
    vec![
        probe(MetricField::Views, "playCount", &format!(r#"(?i)"playCount"\s*:\s*"?{NUM}"?"#)),
        probe(MetricField::Views, "text_views", &format!(r"(?i){NUM}\s*(?:views|plays)\b")),
        probe(MetricField::Views, "views_key", &format!(r#"(?i)"views"\s*:\s*"?{NUM}"?"#)),
        probe(MetricField::Likes, "diggCount", &format!(r#"(?i)"diggCount"\s*:\s*"?{NUM}"?"#)),
        probe(MetricField::Likes, "text_likes", &format!(r"(?i){NUM}\s*likes?\b")),
        probe(MetricField::Comments, "commentCount", &format!(r#"(?i)"commentCount"\s*:\s*"?{NUM}"?"#)),
        probe(MetricField::Comments, "text_comments", &format!(r"(?i){NUM}\s*comments?\b")),
        probe(MetricField::CreatedAt, "createTime", r#"(?i)"createTime"\s*:\s*"?(\d{9,13})"?"#),
    ]
});

/// Parse counts like `"2.1K"`, `"3.4M"`, `"1B"`, `"1,204"` or `"500"`.
/// The suffix multiplies by 10^3 / 10^6 / 10^9 and the result is rounded.
pub fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Some(caps) = ABBREV_RE.captures(raw) {
        let num: f64 = caps[1].replace(',', "").parse().ok()?;
        let scale = match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
            Some(s) if s == "K" => 1e3,
            Some(s) if s == "M" => 1e6,
            Some(s) if s == "B" => 1e9,
            _ => 1.0,
        };
        let value = (num * scale).round();
        return (value.is_finite() && value >= 0.0).then_some(value as u64);
    }
    raw.replace(',', "").parse().ok()
}

pub struct HeuristicScan;

impl ExtractionStrategy for HeuristicScan {
    fn source(&self) -> ExtractionSource {
        ExtractionSource::Heuristic
    }

    fn extract(&self, document: &str, _post_id: Option<&str>) -> Option<Extracted> {
        let mut out = Extracted::default();
        let mut matched = false;
        let mut settled: Vec<MetricField> = Vec::new();

        for probe in PROBES.iter() {
            if settled.contains(&probe.field) {
                continue;
            }
            let Some(raw) = probe.pattern.captures(document).map(|c| c[1].to_string()) else {
                continue;
            };

            let hit = match probe.field {
                MetricField::Views => parse_count(&raw).map(|v| out.views = v),
                MetricField::Likes => parse_count(&raw).map(|v| out.likes = v),
                MetricField::Comments => parse_count(&raw).map(|v| out.comments = v),
                MetricField::CreatedAt => raw
                    .parse::<i64>()
                    .ok()
                    .and_then(timestamp_from_epoch)
                    .map(|t| out.created_at = Some(t)),
            };
            if hit.is_some() {
                matched = true;
                settled.push(probe.field);
            }
        }

        matched.then_some(out)
    }
}

/// Short fragments showing what each probe saw, for operator diagnostics.
pub fn sniff(document: &str) -> Vec<String> {
    PROBES
        .iter()
        .filter_map(|probe| {
            let m = probe.pattern.find(document)?;
            let fragment: String = m.as_str().chars().take(80).collect();
            Some(format!("{}: \"{}\"", probe.label, fragment))
        })
        .collect()
}
