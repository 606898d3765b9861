use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use viewgain_common::FetchError;

use super::retry::{jitter, RetryPolicy};
use super::Fetcher;

/// Request counters shared by every worker in a run.
#[derive(Debug, Default)]
pub struct FetchCounters {
    pub attempts: AtomicU64,
    pub retries: AtomicU64,
    pub failures: AtomicU64,
}

impl FetchCounters {
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Spaces requests at least `delay` (+ jitter) apart across all workers.
struct Pacer {
    delay: Duration,
    max_jitter: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    async fn wait_turn(&self) {
        if self.delay.is_zero() && self.max_jitter.is_zero() {
            return;
        }
        // Held across the sleep so concurrent workers queue behind each other.
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let gap = self.delay + jitter(self.max_jitter);
            let ready = prev + gap;
            if ready > Instant::now() {
                tokio::time::sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// The fetch adapter the pipeline uses: politeness pacing, bounded retries on
/// transport failures, counters. Cheap to clone; clones share pacing state.
#[derive(Clone)]
pub struct ScheduledFetcher {
    inner: Arc<dyn Fetcher>,
    policy: RetryPolicy,
    pacer: Arc<Pacer>,
    counters: Arc<FetchCounters>,
}

impl ScheduledFetcher {
    pub fn new(
        inner: Arc<dyn Fetcher>,
        policy: RetryPolicy,
        delay: Duration,
        max_jitter: Duration,
    ) -> Self {
        Self {
            inner,
            policy,
            pacer: Arc::new(Pacer {
                delay,
                max_jitter,
                last: Mutex::new(None),
            }),
            counters: Arc::new(FetchCounters::default()),
        }
    }

    /// No pacing and no retries. Handy for tests and one-off probes.
    pub fn unpaced(inner: Arc<dyn Fetcher>) -> Self {
        Self::new(inner, RetryPolicy::none(), Duration::ZERO, Duration::ZERO)
    }

    pub fn counters(&self) -> &FetchCounters {
        &self.counters
    }

    pub fn backend(&self) -> &str {
        self.inner.name()
    }

    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let attempts = self.policy.total_attempts();
        let mut attempt = 0;
        loop {
            self.pacer.wait_turn().await;
            self.counters.attempts.fetch_add(1, Ordering::Relaxed);

            match self.inner.fetch(url).await {
                Ok(body) => {
                    debug!(url, bytes = body.len(), "Fetched");
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let wait = self.policy.delay(attempt);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        backoff_ms = wait.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying after backoff"
                    );
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(url, attempts = attempt + 1, error = %e, "Fetch failed");
                    return Err(e);
                }
            }
        }
    }
}
