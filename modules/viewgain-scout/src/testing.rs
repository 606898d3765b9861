// Test doubles for the tracker pipeline.
//
// - MockFetcher (Fetcher): URL -> canned body or scripted failure, with a call log
// - RecordingNotifier (NotifyBackend): keeps every message it was asked to send
//
// Plus document builders shaped like real profile, post and API payloads.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use viewgain_common::FetchError;

use crate::fetch::Fetcher;
use crate::notify::NotifyBackend;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

enum Response {
    Body(String),
    /// Fail with a transport error this many times, then serve the body.
    Flaky { failures: usize, body: String },
    Transport,
    Rejected,
}

/// HashMap-based fetcher. Unregistered URLs are rejected.
/// Builder pattern: `.on()`, `.flaky()`, `.failing()`, `.rejecting()`.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, Response>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: &str, body: impl Into<String>) -> Self {
        self.responses
            .insert(url.to_string(), Response::Body(body.into()));
        self
    }

    pub fn flaky(mut self, url: &str, failures: usize, body: impl Into<String>) -> Self {
        self.responses.insert(
            url.to_string(),
            Response::Flaky {
                failures,
                body: body.into(),
            },
        );
        self
    }

    /// Always a retryable transport error.
    pub fn failing(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Response::Transport);
        self
    }

    pub fn rejecting(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Response::Rejected);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let previous = {
            let mut calls = self.calls.lock().unwrap();
            let previous = calls.iter().filter(|u| *u == url).count();
            calls.push(url.to_string());
            previous
        };

        let transport = || FetchError::Transport {
            url: url.to_string(),
            message: "MockFetcher: connection reset".to_string(),
        };
        match self.responses.get(url) {
            Some(Response::Body(body)) => Ok(body.clone()),
            Some(Response::Flaky { failures, body }) if previous >= *failures => Ok(body.clone()),
            Some(Response::Flaky { .. }) | Some(Response::Transport) => Err(transport()),
            Some(Response::Rejected) | None => Err(FetchError::Rejected {
                url: url.to_string(),
                message: format!("MockFetcher: nothing registered for {url}"),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifyBackend for RecordingNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// ---------------------------------------------------------------------------
// Document builders
// ---------------------------------------------------------------------------

/// One post as it appears in page state and API payloads.
#[derive(Debug, Clone)]
pub struct PostFixture {
    pub id: String,
    /// Epoch seconds.
    pub create_time: i64,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
}

impl PostFixture {
    pub fn new(id: &str, create_time: i64, views: u64) -> Self {
        Self {
            id: id.to_string(),
            create_time,
            views,
            likes: 0,
            comments: 0,
        }
    }

    pub fn likes(mut self, likes: u64) -> Self {
        self.likes = likes;
        self
    }

    pub fn comments(mut self, comments: u64) -> Self {
        self.comments = comments;
        self
    }

    fn item(&self) -> Value {
        json!({
            "id": self.id,
            "createTime": self.create_time,
            "stats": {
                "playCount": self.views,
                "diggCount": self.likes,
                "commentCount": self.comments,
            },
        })
    }
}

fn sigi_page(state: Value) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>TikTok</title></head><body>
<script id="SIGI_STATE" type="application/json">{state}</script>
</body></html>"#
    )
}

/// A profile page whose state carries the identity, the ordered post list
/// and each post's counters.
pub fn profile_page(handle: &str, sec_uid: &str, posts: &[PostFixture]) -> String {
    let module: Map<String, Value> = posts.iter().map(|p| (p.id.clone(), p.item())).collect();
    let list: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    sigi_page(json!({
        "UserModule": { "users": { handle: { "uniqueId": handle, "secUid": sec_uid } } },
        "ItemList": { "user-post": { "list": list } },
        "ItemModule": module,
    }))
}

/// A profile page with the identity but no post data (client-rendered feed).
pub fn bare_profile_page(handle: &str, sec_uid: &str) -> String {
    sigi_page(json!({
        "UserModule": { "users": { handle: { "uniqueId": handle, "secUid": sec_uid } } },
    }))
}

/// A post page with its counters in page state.
pub fn post_page(post: &PostFixture) -> String {
    sigi_page(json!({ "ItemModule": { post.id.clone(): post.item() } }))
}

/// A post page carrying only schema.org markup.
pub fn semantic_post_page(views: u64, likes: u64) -> String {
    format!(
        r#"<html><head><script type="application/ld+json">{}</script></head><body></body></html>"#,
        json!({
            "@context": "https://schema.org",
            "@type": "VideoObject",
            "interactionStatistic": [{
                "@type": "InteractionCounter",
                "interactionType": { "@type": "https://schema.org/WatchAction" },
                "userInteractionCount": views,
            }],
            "aggregateRating": { "ratingCount": likes },
        })
    )
}

/// A login wall or similar page with nothing machine-readable.
pub fn empty_page() -> String {
    "<html><body><p>Something went wrong</p></body></html>".to_string()
}

/// TikAPI `/public/check` response.
pub fn api_profile(handle: &str, sec_uid: &str) -> String {
    json!({
        "status": "success",
        "userInfo": { "user": { "uniqueId": handle, "secUid": sec_uid } },
    })
    .to_string()
}

/// TikAPI `/public/posts` response.
pub fn api_posts(posts: &[PostFixture]) -> String {
    let items: Vec<Value> = posts.iter().map(PostFixture::item).collect();
    json!({ "status": "success", "itemList": items, "cursor": "0", "hasMore": false }).to_string()
}
