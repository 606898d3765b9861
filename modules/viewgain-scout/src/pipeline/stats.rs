use std::fmt;

/// Counters for one tracker run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub accounts_processed: u64,
    pub accounts_failed: u64,
    pub accounts_skipped: u64,
    pub posts_listed: u64,
    pub posts_observed: u64,
    pub posts_degraded: u64,
    pub posts_gained: u64,
    pub fetch_attempts: u64,
    pub fetch_retries: u64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accounts={} failed={} skipped={} listed={} observed={} degraded={} gained={} fetches={} retries={}",
            self.accounts_processed, self.accounts_failed, self.accounts_skipped,
            self.posts_listed, self.posts_observed, self.posts_degraded, self.posts_gained,
            self.fetch_attempts, self.fetch_retries,
        )
    }
}
