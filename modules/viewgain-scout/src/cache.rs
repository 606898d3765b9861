//! Per-post "last observed" views, persisted between runs.
//!
//! The cache is loaded once at startup and flushed once after every account
//! has finished. A crash before the flush leaves the previous file untouched.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use viewgain_common::{CacheEntry, DeltaRecord, PostMetrics, Result, TrackerError};

pub type CacheMap = BTreeMap<String, CacheEntry>;

/// Storage behind the delta cache.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<CacheMap>;
    fn save(&self, entries: &CacheMap) -> Result<()>;
    fn describe(&self) -> String;
}

impl<S: CacheStore + ?Sized> CacheStore for std::sync::Arc<S> {
    fn load(&self) -> Result<CacheMap> {
        (**self).load()
    }

    fn save(&self, entries: &CacheMap) -> Result<()> {
        (**self).save(entries)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// --- JSON file ---

/// `{ "<post_id>": { "last_views": .., "last_updated_at": .. } }` on disk,
/// replaced atomically on save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> TrackerError {
        TrackerError::CacheIo {
            path: self.path.clone(),
            source,
        }
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<CacheMap> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No cache file yet, starting empty");
                return Ok(CacheMap::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(CacheMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| TrackerError::CacheCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, entries: &CacheMap) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).map_err(|e| {
            self.io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), entries = entries.len(), "Cache written");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// --- In memory ---

/// Cache storage that never touches disk. Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<CacheMap>,
    saves: AtomicUsize,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(entries: CacheMap) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Every save fails with a `CacheIo` error.
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CacheMap {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<CacheMap> {
        Ok(self.snapshot())
    }

    fn save(&self, entries: &CacheMap) -> Result<()> {
        if self.fail_saves {
            return Err(TrackerError::CacheIo {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("store configured to fail"),
            });
        }
        *self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = entries.clone();
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

// --- Delta cache ---

/// Loaded cache plus the delta rule. Owned by the single aggregating loop.
pub struct DeltaCache {
    store: Box<dyn CacheStore>,
    entries: CacheMap,
}

impl DeltaCache {
    pub fn open(store: Box<dyn CacheStore>) -> Result<Self> {
        let entries = store.load()?;
        info!(store = %store.describe(), entries = entries.len(), "Cache loaded");
        Ok(Self { store, entries })
    }

    pub fn get(&self, post_id: &str) -> Option<&CacheEntry> {
        self.entries.get(post_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `current_views` for a post. Returns `(previous, gained)` where an
    /// unseen post has previous 0 and a decrease gains 0. The entry is always
    /// overwritten.
    pub fn observe_views(&mut self, post_id: &str, current_views: u64, now: DateTime<Utc>) -> (u64, u64) {
        let previous = self.entries.get(post_id).map_or(0, |e| e.last_views);
        let gained = current_views.saturating_sub(previous);
        self.entries.insert(
            post_id.to_string(),
            CacheEntry {
                last_views: current_views,
                last_updated_at: now.timestamp_millis(),
            },
        );
        (previous, gained)
    }

    pub fn observe(&mut self, post: PostMetrics, now: DateTime<Utc>) -> DeltaRecord {
        let (previous_views, gained) = self.observe_views(&post.id, post.views, now);
        DeltaRecord {
            post,
            previous_views,
            gained,
        }
    }

    /// Persist every entry in one write.
    pub fn flush(&self) -> Result<()> {
        self.store.save(&self.entries)?;
        info!(store = %self.store.describe(), entries = self.entries.len(), "Cache flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn first_observation_counts_from_zero() {
        let mut cache = DeltaCache::open(Box::new(MemoryStore::new())).unwrap();
        assert_eq!(cache.observe_views("p", 1500, at(100)), (0, 1500));
        assert_eq!(cache.get("p").unwrap().last_updated_at, 100_000);
    }

    #[test]
    fn decrease_gains_nothing_but_resets_baseline() {
        let mut cache = DeltaCache::open(Box::new(MemoryStore::new())).unwrap();
        cache.observe_views("p", 1000, at(1));
        assert_eq!(cache.observe_views("p", 800, at(2)), (1000, 0));
        assert_eq!(cache.observe_views("p", 900, at(3)), (800, 100));
    }

    #[test]
    fn file_store_round_trips_and_reads_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("views_cache.json");
        std::fs::write(&path, r#"{"111":{"views":500,"updatedAt":1700000000000}}"#).unwrap();

        let mut cache = DeltaCache::open(Box::new(JsonFileStore::new(&path))).unwrap();
        assert_eq!(cache.observe_views("111", 700, at(5)), (500, 200));
        cache.observe_views("222", 10, at(5));
        cache.flush().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"last_views\": 700"));
        assert!(!written.contains("updatedAt"));

        let reopened = DeltaCache::open(Box::new(JsonFileStore::new(&path))).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("222").unwrap().last_views, 10);
    }

    #[test]
    fn missing_or_empty_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(JsonFileStore::new(&path).load().unwrap().is_empty());

        std::fs::write(&path, "  \n").unwrap();
        assert!(JsonFileStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = DeltaCache::open(Box::new(JsonFileStore::new(&path))).err().unwrap();
        assert!(matches!(err, TrackerError::CacheCorrupt { .. }));
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStore::new();
        let mut entries = CacheMap::new();
        entries.insert(
            "x".into(),
            CacheEntry {
                last_views: 1,
                last_updated_at: 0,
            },
        );
        store.save(&entries).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.snapshot(), entries);
        assert!(MemoryStore::failing().save(&entries).is_err());
    }
}
