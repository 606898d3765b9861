// Handle -> stable account identity (secUid).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use viewgain_common::{normalize_handle, TrackerError};

use crate::document::{at, id_string, state_blobs};
use crate::fetch::ScheduledFetcher;
use crate::urls::SourceUrls;

static SEC_UID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""secUid"\s*:\s*"([^"]+)""#).expect("valid regex"));

/// Read the account identity out of a profile document.
pub fn identity_from_document(handle: &str, document: &str) -> Option<String> {
    let handle = normalize_handle(handle);

    for blob in state_blobs(document) {
        if let Some(id) = identity_from_blob(&blob, &handle) {
            return Some(id);
        }
    }

    SEC_UID_RE
        .captures(document)
        .map(|c| c[1].trim().to_string())
        .filter(|id| !id.is_empty())
}

fn identity_from_blob(blob: &Value, handle: &str) -> Option<String> {
    let direct = [
        at(blob, &["userInfo", "user", "secUid"]),
        at(
            blob,
            &["__DEFAULT_SCOPE__", "webapp.user-detail", "userInfo", "user", "secUid"],
        ),
    ];
    if let Some(id) = direct.into_iter().flatten().find_map(id_string) {
        return Some(id);
    }

    let Some(Value::Object(users)) = at(blob, &["UserModule", "users"]) else {
        return None;
    };
    let by_handle = users
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(handle))
        .map(|(_, user)| user);
    let user = match by_handle {
        Some(user) => user,
        None if users.len() == 1 => users.values().next()?,
        None => return None,
    };
    user.get("secUid").and_then(id_string)
}

/// Fetches profile documents and resolves identities. No retries beyond the
/// fetcher's own; a document without an identity is `IdentityNotFound`.
pub struct IdentityResolver<'a> {
    fetcher: &'a ScheduledFetcher,
    urls: &'a dyn SourceUrls,
    variant_fallback: bool,
}

/// A resolved identity together with the profile document it came from,
/// which the lister can fall back to.
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub identity: String,
    pub document: String,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(fetcher: &'a ScheduledFetcher, urls: &'a dyn SourceUrls, variant_fallback: bool) -> Self {
        Self {
            fetcher,
            urls,
            variant_fallback,
        }
    }

    pub async fn resolve(&self, handle: &str) -> Result<ResolvedProfile, TrackerError> {
        let handle = normalize_handle(handle);
        let url = self.urls.profile(&handle);
        let document = self.fetcher.fetch(&url).await?;

        if let Some(identity) = identity_from_document(&handle, &document) {
            debug!(handle = %handle, "Identity resolved");
            return Ok(ResolvedProfile { identity, document });
        }

        if self.variant_fallback {
            if let Some(variant) = self.urls.variant(&url) {
                info!(handle = %handle, url = %variant, "No identity in profile, trying variant");
                match self.fetcher.fetch(&variant).await {
                    Ok(document) => {
                        if let Some(identity) = identity_from_document(&handle, &document) {
                            return Ok(ResolvedProfile { identity, document });
                        }
                    }
                    Err(e) => debug!(handle = %handle, error = %e, "Variant profile fetch failed"),
                }
            }
        }

        Err(TrackerError::IdentityNotFound { handle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_profile_shape() {
        let body = r#"{"status":"success","userInfo":{"user":{"uniqueId":"alice","secUid":"MS4wLjABAAAA"}}}"#;
        assert_eq!(identity_from_document("@alice", body).as_deref(), Some("MS4wLjABAAAA"));
    }

    #[test]
    fn rehydration_blob_shape() {
        let html = r#"<script id="__UNIVERSAL_DATA_FOR_REHYDRATION__" type="application/json">
            {"__DEFAULT_SCOPE__":{"webapp.user-detail":{"userInfo":{"user":{"secUid":"S-rehydrated"}}}}}
        </script>"#;
        assert_eq!(identity_from_document("alice", html).as_deref(), Some("S-rehydrated"));
    }

    #[test]
    fn user_module_matched_by_handle() {
        let html = r#"<script id="SIGI_STATE">{"UserModule":{"users":{
            "bob":{"secUid":"S-bob"},"Alice":{"secUid":"S-alice"}}}}</script>"#;
        assert_eq!(identity_from_document("alice", html).as_deref(), Some("S-alice"));
    }

    #[test]
    fn raw_scan_is_last_resort() {
        let html = r#"<div data-x='{"secUid":"S-raw","other":1}'></div>"#;
        assert_eq!(identity_from_document("alice", html).as_deref(), Some("S-raw"));
    }

    #[test]
    fn no_identity_field() {
        assert_eq!(identity_from_document("alice", "<html>login wall</html>"), None);
    }
}
