use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use tikapi_client::TikApiClient;
use viewgain_common::{parse_account_list, Account, ExtractionSource, TrackerError};
use viewgain_scout::cache::{DeltaCache, MemoryStore};
use viewgain_scout::fetch::{RetryPolicy, ScheduledFetcher};
use viewgain_scout::pipeline::{DiagnosticKind, RunOutcome, Tracker, TrackerSettings};
use viewgain_scout::rank::rank_deltas;
use viewgain_scout::testing::{
    api_posts, api_profile, bare_profile_page, empty_page, post_page, profile_page,
    semantic_post_page, MockFetcher, PostFixture,
};
use viewgain_scout::urls::{TikApiUrls, WebUrls};

const PROFILE_ALICE: &str = "https://www.tiktok.com/@alice";

fn now(hour: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + hour * 3600, 0).unwrap()
}

fn accounts(raw: &str) -> Vec<Account> {
    parse_account_list(raw)
}

fn settings() -> TrackerSettings {
    TrackerSettings::builder().build()
}

fn web_tracker(mock: Arc<MockFetcher>, settings: TrackerSettings) -> Tracker {
    Tracker::new(ScheduledFetcher::unpaced(mock), Box::new(WebUrls), settings)
}

async fn run_once(
    mock: MockFetcher,
    store: &Arc<MemoryStore>,
    accounts: &[Account],
    at: DateTime<Utc>,
) -> RunOutcome {
    let mut cache = DeltaCache::open(Box::new(store.clone())).unwrap();
    web_tracker(Arc::new(mock), settings())
        .run(accounts, &mut cache, at)
        .await
        .unwrap()
}

fn alice_with(views: &[(&str, u64)]) -> MockFetcher {
    let posts: Vec<PostFixture> = views
        .iter()
        .enumerate()
        .map(|(i, (id, v))| PostFixture::new(id, 1_700_000_000 - i as i64 * 60, *v))
        .collect();
    MockFetcher::new().on(PROFILE_ALICE, profile_page("alice", "S-alice", &posts))
}

fn gained(outcome: &RunOutcome, id: &str) -> u64 {
    outcome
        .records
        .iter()
        .find(|r| r.post.id == id)
        .map(|r| r.gained)
        .unwrap()
}

#[tokio::test]
async fn first_run_counts_from_zero_then_reports_the_gain() {
    let store = Arc::new(MemoryStore::new());
    let list = accounts("@alice");

    let first = run_once(alice_with(&[("7001", 1000), ("7002", 500)]), &store, &list, now(0)).await;
    assert_eq!(gained(&first, "7001"), 1000);
    assert_eq!(gained(&first, "7002"), 500);
    assert_eq!(store.save_count(), 1);

    let second = run_once(alice_with(&[("7001", 1500), ("7002", 500)]), &store, &list, now(8)).await;
    assert_eq!(gained(&second, "7001"), 500);
    assert_eq!(gained(&second, "7002"), 0);

    let ranked = rank_deltas(second.records, 10);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].post.id, "7001");
    assert_eq!(ranked[0].previous_views, 1000);

    let entry = store.snapshot()["7001"];
    assert_eq!(entry.last_views, 1500);
    assert_eq!(entry.last_updated_at, now(8).timestamp_millis());
}

#[tokio::test]
async fn immediate_rerun_gains_nothing() {
    let store = Arc::new(MemoryStore::new());
    let list = accounts("alice");

    run_once(alice_with(&[("1", 40), ("2", 90)]), &store, &list, now(0)).await;
    let again = run_once(alice_with(&[("1", 40), ("2", 90)]), &store, &list, now(0)).await;

    assert!(again.records.iter().all(|r| r.gained == 0));
    assert!(rank_deltas(again.records, 10).is_empty());
}

#[tokio::test]
async fn decrease_gains_zero() {
    let store = Arc::new(MemoryStore::new());
    let list = accounts("alice");

    run_once(alice_with(&[("1", 900)]), &store, &list, now(0)).await;
    let after = run_once(alice_with(&[("1", 850)]), &store, &list, now(1)).await;

    assert_eq!(gained(&after, "1"), 0);
    assert_eq!(store.snapshot()["1"].last_views, 850);
}

#[tokio::test]
async fn monotone_views_sum_to_total_growth() {
    let store = Arc::new(MemoryStore::new());
    let list = accounts("alice");
    let series = [100, 250, 250, 900, 1200];

    let mut total_after_first = 0;
    for (i, views) in series.iter().enumerate() {
        let outcome = run_once(alice_with(&[("1", *views)]), &store, &list, now(i as i64)).await;
        if i > 0 {
            total_after_first += gained(&outcome, "1");
        }
    }
    assert_eq!(total_after_first, 1200 - 100);
}

#[tokio::test]
async fn account_failures_become_diagnostics() {
    let mock = alice_with(&[("1", 10)])
        .failing("https://www.tiktok.com/@bob")
        .on("https://www.tiktok.com/@carol", empty_page());
    let store = Arc::new(MemoryStore::new());

    let outcome = run_once(mock, &store, &accounts("alice\nbob\ncarol"), now(0)).await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.stats.accounts_processed, 1);
    assert_eq!(outcome.stats.accounts_failed, 2);

    let kinds: Vec<(String, DiagnosticKind)> = outcome
        .diagnostics
        .iter()
        .map(|d| (d.handle.clone(), d.kind))
        .collect();
    assert!(kinds.contains(&("bob".into(), DiagnosticKind::FetchFailed)));
    assert!(kinds.contains(&("carol".into(), DiagnosticKind::IdentityNotFound)));
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn an_account_without_posts_is_reported() {
    let mock = alice_with(&[("1", 10)])
        .on("https://www.tiktok.com/@quiet", bare_profile_page("quiet", "S-quiet"));
    let store = Arc::new(MemoryStore::new());

    let outcome = run_once(mock, &store, &accounts("alice\nquiet"), now(0)).await;

    assert_eq!(outcome.stats.accounts_processed, 2);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::NoPosts);
    assert_eq!(outcome.diagnostics[0].to_string(), "@quiet: no posts returned");
}

#[tokio::test]
async fn degraded_readings_are_not_cached() {
    let fixture = PostFixture::new("55", 1_700_000_000, 300);
    let mock = Arc::new(
        MockFetcher::new()
            .on(PROFILE_ALICE, profile_page("alice", "S-alice", &[fixture]))
            .on("https://www.tiktok.com/@alice/video/55", empty_page())
            .on("https://www.tiktok.com/@alice/video/55?lang=en", empty_page()),
    );
    let store = Arc::new(MemoryStore::new());
    let mut cache = DeltaCache::open(Box::new(store.clone())).unwrap();
    let settings = TrackerSettings::builder()
        .reuse_listing_metrics(false)
        .build();

    let outcome = web_tracker(mock, settings)
        .run(&accounts("alice"), &mut cache, now(0))
        .await
        .unwrap();

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stats.posts_degraded, 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ExtractionDegraded);
    assert_eq!(outcome.diagnostics[0].post_id.as_deref(), Some("55"));
    assert!(!store.snapshot().contains_key("55"));
}

#[tokio::test]
async fn listing_counters_spare_post_fetches() {
    let mock = Arc::new(alice_with(&[("1", 10), ("2", 20)]));
    let mut cache = DeltaCache::open(Box::new(MemoryStore::new())).unwrap();

    web_tracker(mock.clone(), settings())
        .run(&accounts("alice"), &mut cache, now(0))
        .await
        .unwrap();

    assert!(mock.calls().iter().all(|u| !u.contains("/video/")));
}

#[tokio::test]
async fn listing_counters_are_only_reused_for_the_matching_post() {
    // The list names two posts but the state only embeds counters for one.
    let profile = r#"<html><body><script id="SIGI_STATE" type="application/json">{
        "UserModule":{"users":{"alice":{"uniqueId":"alice","secUid":"S-alice"}}},
        "ItemList":{"user-post":{"list":["111","222"]}},
        "ItemModule":{"111":{"id":"111","createTime":1700000000,"stats":{"playCount":90000}}}
    }</script></body></html>"#;
    let mock = Arc::new(
        MockFetcher::new()
            .on(PROFILE_ALICE, profile)
            .on(
                "https://www.tiktok.com/@alice/video/222",
                post_page(&PostFixture::new("222", 1_699_999_000, 15)),
            ),
    );
    let mut cache = DeltaCache::open(Box::new(MemoryStore::new())).unwrap();

    let outcome = web_tracker(mock.clone(), settings())
        .run(&accounts("alice"), &mut cache, now(0))
        .await
        .unwrap();

    assert_eq!(gained(&outcome, "111"), 90_000);
    assert_eq!(gained(&outcome, "222"), 15);
    assert_eq!(cache.get("222").unwrap().last_views, 15);
    assert_eq!(mock.calls_to("https://www.tiktok.com/@alice/video/222"), 1);
    assert_eq!(mock.calls_to("https://www.tiktok.com/@alice/video/111"), 0);
}

#[tokio::test]
async fn post_pages_are_read_when_listing_has_no_counters() {
    let fixture = PostFixture::new("1", 1_700_000_000, 4200).likes(31);
    let profile = bare_profile_page("alice", "S-alice")
        .replace("</body>", r#"<a href="/@alice/video/12345678">x</a></body>"#);
    let mock = Arc::new(
        MockFetcher::new()
            .on(PROFILE_ALICE, profile)
            .on(
                "https://www.tiktok.com/@alice/video/12345678",
                post_page(&PostFixture { id: "12345678".into(), ..fixture }),
            ),
    );
    let mut cache = DeltaCache::open(Box::new(MemoryStore::new())).unwrap();

    let outcome = web_tracker(mock, settings())
        .run(&accounts("alice"), &mut cache, now(0))
        .await
        .unwrap();

    let post = &outcome.records[0].post;
    assert_eq!((post.views, post.likes), (4200, 31));
    assert_eq!(post.extraction_source, ExtractionSource::Structured);
    assert_eq!(post.url, "https://www.tiktok.com/@alice/video/12345678");
}

#[tokio::test]
async fn variant_fills_in_an_empty_post_page() {
    let fixture = PostFixture::new("77", 1_700_000_000, 1);
    let mock = Arc::new(
        MockFetcher::new()
            .on(PROFILE_ALICE, profile_page("alice", "S-alice", &[fixture]))
            .on("https://www.tiktok.com/@alice/video/77", empty_page())
            .on("https://www.tiktok.com/@alice/video/77?lang=en", semantic_post_page(5000, 70)),
    );
    let mut cache = DeltaCache::open(Box::new(MemoryStore::new())).unwrap();
    let settings = TrackerSettings::builder()
        .reuse_listing_metrics(false)
        .build();

    let outcome = web_tracker(mock, settings)
        .run(&accounts("alice"), &mut cache, now(0))
        .await
        .unwrap();

    let post = &outcome.records[0].post;
    assert_eq!((post.views, post.likes), (5000, 70));
    assert_eq!(post.extraction_source, ExtractionSource::Semantic);
    assert_eq!(post.url, "https://www.tiktok.com/@alice/video/77");
}

#[tokio::test]
async fn flush_failure_is_fatal() {
    let mut cache = DeltaCache::open(Box::new(MemoryStore::failing())).unwrap();
    let err = web_tracker(Arc::new(alice_with(&[("1", 5)])), settings())
        .run(&accounts("alice"), &mut cache, now(0))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::CacheIo { .. }));
}

#[tokio::test]
async fn exhausted_budget_skips_remaining_accounts() {
    let mock = Arc::new(alice_with(&[("1", 5)]));
    let store = Arc::new(MemoryStore::new());
    let mut cache = DeltaCache::open(Box::new(store.clone())).unwrap();
    let settings = TrackerSettings::builder()
        .run_budget(Some(Duration::ZERO))
        .build();

    let outcome = web_tracker(mock.clone(), settings)
        .run(&accounts("alice\nbob"), &mut cache, now(0))
        .await
        .unwrap();

    assert_eq!(outcome.stats.accounts_skipped, 2);
    assert!(outcome
        .diagnostics
        .iter()
        .all(|d| d.kind == DiagnosticKind::BudgetExhausted));
    assert!(mock.calls().is_empty());
    // Nothing observed, but the cache is still flushed once.
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn transient_profile_failures_are_retried() {
    let posts = [PostFixture::new("1", 1_700_000_000, 64)];
    let mock = Arc::new(MockFetcher::new().flaky(
        PROFILE_ALICE,
        2,
        profile_page("alice", "S-alice", &posts),
    ));
    let policy = RetryPolicy {
        max_retries: 2,
        base_backoff: Duration::ZERO,
        max_jitter: Duration::ZERO,
    };
    let fetcher = ScheduledFetcher::new(mock.clone(), policy, Duration::ZERO, Duration::ZERO);
    let tracker = Tracker::new(fetcher, Box::new(WebUrls), settings());
    let mut cache = DeltaCache::open(Box::new(MemoryStore::new())).unwrap();

    let outcome = tracker
        .run(&accounts("alice"), &mut cache, now(0))
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(mock.calls_to(PROFILE_ALICE), 3);
    assert_eq!(outcome.stats.fetch_retries, 2);
}

#[tokio::test]
async fn concurrent_workers_commit_every_account() {
    let mut mock = MockFetcher::new();
    let handles = ["a1", "a2", "a3", "a4", "a5", "a6"];
    for (i, handle) in handles.iter().enumerate() {
        let posts = [PostFixture::new(&format!("{i}00"), 1_700_000_000, 10 * (i as u64 + 1))];
        mock = mock.on(
            &format!("https://www.tiktok.com/@{handle}"),
            profile_page(handle, &format!("S-{handle}"), &posts),
        );
    }
    let store = Arc::new(MemoryStore::new());
    let mut cache = DeltaCache::open(Box::new(store.clone())).unwrap();
    let settings = TrackerSettings::builder().workers(3).build();

    let outcome = web_tracker(Arc::new(mock), settings)
        .run(&accounts(&handles.join("\n")), &mut cache, now(0))
        .await
        .unwrap();

    assert_eq!(outcome.stats.accounts_processed, 6);
    assert_eq!(store.snapshot().len(), 6);
    assert_eq!(store.snapshot()["500"].last_views, 60);
}

#[tokio::test]
async fn a_post_seen_twice_in_one_run_is_observed_once() {
    let shared = [PostFixture::new("999", 1_700_000_000, 700)];
    let mock = MockFetcher::new()
        .on(PROFILE_ALICE, profile_page("alice", "S-alice", &shared))
        .on("https://www.tiktok.com/@bob", profile_page("bob", "S-bob", &shared));
    let store = Arc::new(MemoryStore::new());

    let outcome = run_once(mock, &store, &accounts("alice\nbob"), now(0)).await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].gained, 700);
}

#[tokio::test]
async fn tikapi_source_reads_listing_counters() {
    let posts = [
        PostFixture::new("31", 1_700_000_500, 12_000).likes(800),
        PostFixture::new("30", 1_700_000_000, 3_000),
    ];
    let mock = Arc::new(
        MockFetcher::new()
            .on(&TikApiClient::profile_url("alice"), api_profile("alice", "S-alice"))
            .on(&TikApiClient::posts_url("S-alice", 30), api_posts(&posts)),
    );
    let tracker = Tracker::new(ScheduledFetcher::unpaced(mock.clone()), Box::new(TikApiUrls), settings());
    let mut cache = DeltaCache::open(Box::new(MemoryStore::new())).unwrap();

    let outcome = tracker
        .run(&accounts("@alice"), &mut cache, now(0))
        .await
        .unwrap();

    let ids: Vec<&str> = outcome.records.iter().map(|r| r.post.id.as_str()).collect();
    assert_eq!(ids, vec!["31", "30"]);
    assert_eq!(outcome.records[0].post.likes, 800);
    assert_eq!(mock.calls().len(), 2);
}
