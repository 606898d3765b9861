// Where each document lives, per source.

use tikapi_client::TikApiClient;
use url::Url;

use viewgain_common::SourceKind;

const WEB_ORIGIN: &str = "https://www.tiktok.com";

/// Public link to a post, as shown in reports.
pub fn public_post_url(handle: &str, post_id: &str) -> String {
    format!("{WEB_ORIGIN}/@{handle}/video/{post_id}")
}

/// Public link to a profile, as shown in reports.
pub fn public_profile_url(handle: &str) -> String {
    format!("{WEB_ORIGIN}/@{handle}")
}

pub trait SourceUrls: Send + Sync {
    /// Document the identity is resolved from.
    fn profile(&self, handle: &str) -> String;

    /// Dedicated listing endpoint, if the source has one.
    fn listing(&self, identity: &str, max_count: usize) -> Option<String>;

    /// Document the metrics of one post are read from.
    fn post_document(&self, handle: &str, post_id: &str) -> String;

    /// Alternate rendering of the same document, tried once when the first
    /// one yields nothing usable.
    fn variant(&self, url: &str) -> Option<String>;
}

/// Public web pages.
pub struct WebUrls;

impl SourceUrls for WebUrls {
    fn profile(&self, handle: &str) -> String {
        public_profile_url(handle)
    }

    fn listing(&self, identity: &str, max_count: usize) -> Option<String> {
        let mut url = Url::parse(&format!("{WEB_ORIGIN}/api/post/item_list/")).ok()?;
        url.query_pairs_mut()
            .append_pair("aid", "1988")
            .append_pair("count", &max_count.to_string())
            .append_pair("cursor", "0")
            .append_pair("secUid", identity);
        Some(url.into())
    }

    fn post_document(&self, handle: &str, post_id: &str) -> String {
        public_post_url(handle, post_id)
    }

    fn variant(&self, url: &str) -> Option<String> {
        let mut parsed = Url::parse(url).ok()?;
        if parsed.query_pairs().any(|(k, _)| k == "lang") {
            return None;
        }
        parsed.query_pairs_mut().append_pair("lang", "en");
        Some(parsed.into())
    }
}

/// TikAPI REST endpoints. JSON documents have no alternate rendering.
pub struct TikApiUrls;

impl SourceUrls for TikApiUrls {
    fn profile(&self, handle: &str) -> String {
        TikApiClient::profile_url(handle)
    }

    fn listing(&self, identity: &str, max_count: usize) -> Option<String> {
        let count = u32::try_from(max_count).unwrap_or(u32::MAX);
        Some(TikApiClient::posts_url(identity, count))
    }

    fn post_document(&self, _handle: &str, post_id: &str) -> String {
        TikApiClient::video_url(post_id)
    }

    fn variant(&self, _url: &str) -> Option<String> {
        None
    }
}

pub fn for_source(source: SourceKind) -> Box<dyn SourceUrls> {
    match source {
        SourceKind::Web => Box::new(WebUrls),
        SourceKind::Tikapi => Box::new(TikApiUrls),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_urls() {
        assert_eq!(WebUrls.profile("alice"), "https://www.tiktok.com/@alice");
        assert_eq!(
            WebUrls.post_document("alice", "7301"),
            "https://www.tiktok.com/@alice/video/7301"
        );
        assert_eq!(
            WebUrls.listing("MS4w+x", 30).as_deref(),
            Some("https://www.tiktok.com/api/post/item_list/?aid=1988&count=30&cursor=0&secUid=MS4w%2Bx")
        );
    }

    #[test]
    fn web_variant_adds_language_once() {
        let v = WebUrls.variant("https://www.tiktok.com/@alice").unwrap();
        assert_eq!(v, "https://www.tiktok.com/@alice?lang=en");
        assert_eq!(WebUrls.variant(&v), None);

        let listed = WebUrls.variant("https://www.tiktok.com/@a/video/1?is_from_webapp=1").unwrap();
        assert!(listed.ends_with("?is_from_webapp=1&lang=en"));
    }

    #[test]
    fn tikapi_has_no_variants() {
        assert_eq!(TikApiUrls.variant("https://api.tikapi.io/public/video?id=1"), None);
        assert!(TikApiUrls.profile("bob").contains("/public/check?username=bob"));
    }
}
