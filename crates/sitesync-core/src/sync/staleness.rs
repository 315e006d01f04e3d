//! Last-successful-sync cursor and cache staleness checks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::unix_millis_now;

/// File name of the cursor state kept next to the database.
pub const SYNC_STATE_FILE_NAME: &str = "sync-state.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorFile {
    last_sync_ms: i64,
}

/// Where the sync cursor is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorStore {
    Memory,
    File(PathBuf),
}

impl CursorStore {
    fn load(&self) -> Result<i64> {
        let Self::File(path) = self else {
            return Ok(0);
        };
        if !path.exists() {
            return Ok(0);
        }
        let raw = std::fs::read_to_string(path)?;
        let state: CursorFile = serde_json::from_str(&raw)?;
        Ok(state.last_sync_ms)
    }

    fn save(&self, last_sync_ms: i64) -> Result<()> {
        let Self::File(path) = self else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string(&CursorFile { last_sync_ms })?;
        std::fs::write(path, serialized)?;
        Ok(())
    }
}

/// Tracks when data was last exchanged successfully with the remote.
///
/// The cursor only moves forward. Persistence failures are logged and the
/// in-memory value stays authoritative for the rest of the process.
#[derive(Debug)]
pub struct StalenessTracker {
    last_sync_ms: AtomicI64,
    max_cache_age_ms: i64,
    store: CursorStore,
    persist_lock: Mutex<()>,
}

impl StalenessTracker {
    /// Tracker whose cursor lives only in memory.
    pub fn in_memory(max_cache_age: Duration) -> Self {
        Self::with_store(CursorStore::Memory, 0, max_cache_age)
    }

    /// Tracker persisted to a JSON state file.
    pub fn open(path: impl Into<PathBuf>, max_cache_age: Duration) -> Self {
        let store = CursorStore::File(path.into());
        let last_sync_ms = store.load().unwrap_or_else(|error| {
            tracing::warn!("Ignoring unreadable sync state: {error}");
            0
        });
        Self::with_store(store, last_sync_ms, max_cache_age)
    }

    /// Tracker persisted next to the given database file.
    pub fn beside_database(db_path: &Path, max_cache_age: Duration) -> Self {
        Self::open(db_path.with_file_name(SYNC_STATE_FILE_NAME), max_cache_age)
    }

    fn with_store(store: CursorStore, last_sync_ms: i64, max_cache_age: Duration) -> Self {
        Self {
            last_sync_ms: AtomicI64::new(last_sync_ms),
            max_cache_age_ms: i64::try_from(max_cache_age.as_millis()).unwrap_or(i64::MAX),
            store,
            persist_lock: Mutex::new(()),
        }
    }

    /// Record a successful exchange at `timestamp_ms`.
    ///
    /// Timestamps older than the current cursor are ignored.
    pub fn record_sync_success(&self, timestamp_ms: i64) {
        let previous = self.last_sync_ms.fetch_max(timestamp_ms, Ordering::SeqCst);
        if timestamp_ms <= previous {
            return;
        }

        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.last_sync_ms.load(Ordering::SeqCst);
        if let Err(error) = self.store.save(current) {
            tracing::warn!("Failed to persist sync cursor: {error}");
        }
    }

    /// Last successful sync (Unix ms), if any.
    pub fn last_sync(&self) -> Option<i64> {
        match self.last_sync_ms.load(Ordering::SeqCst) {
            0 => None,
            value => Some(value),
        }
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(unix_millis_now())
    }

    /// Whether the cache is older than the max age at `now_ms`.
    pub fn is_stale_at(&self, now_ms: i64) -> bool {
        let last_sync = self.last_sync_ms.load(Ordering::SeqCst);
        now_ms.saturating_sub(last_sync) > self.max_cache_age_ms
    }

    pub fn max_cache_age(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.max_cache_age_ms).unwrap_or_default())
    }

    pub const fn cursor_store(&self) -> &CursorStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const HOUR: Duration = Duration::from_secs(60 * 60);
    const HOUR_MS: i64 = 60 * 60 * 1000;

    #[test]
    fn fresh_tracker_is_stale() {
        let tracker = StalenessTracker::in_memory(HOUR);
        assert_eq!(tracker.last_sync(), None);
        assert!(tracker.is_stale());
    }

    #[test]
    fn staleness_lifecycle() {
        let tracker = StalenessTracker::in_memory(HOUR);
        let now = unix_millis_now();

        tracker.record_sync_success(now);
        assert!(!tracker.is_stale_at(now));
        assert!(!tracker.is_stale_at(now + HOUR_MS));
        assert!(tracker.is_stale_at(now + HOUR_MS + 1));
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let tracker = StalenessTracker::in_memory(HOUR);
        tracker.record_sync_success(2_000);
        tracker.record_sync_success(1_000);
        assert_eq!(tracker.last_sync(), Some(2_000));
    }

    #[test]
    fn cursor_persists_across_instances() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("sitesync.db");

        StalenessTracker::beside_database(&db_path, HOUR).record_sync_success(42_000);

        let reopened = StalenessTracker::beside_database(&db_path, HOUR);
        assert_eq!(reopened.last_sync(), Some(42_000));
        assert_eq!(
            reopened.cursor_store(),
            &CursorStore::File(tmp.path().join(SYNC_STATE_FILE_NAME))
        );
    }

    #[test]
    fn unreadable_state_file_starts_stale() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join(SYNC_STATE_FILE_NAME);
        std::fs::write(&path, "not json").unwrap();

        let tracker = StalenessTracker::open(&path, HOUR);
        assert_eq!(tracker.last_sync(), None);
        assert!(tracker.is_stale());
    }

    #[test]
    fn persistence_failure_keeps_memory_value() {
        let tmp = tempdir().unwrap();
        // A directory in place of the file makes every write fail.
        let path = tmp.path().join("state-dir");
        std::fs::create_dir(&path).unwrap();

        let tracker = StalenessTracker::open(&path, HOUR);
        tracker.record_sync_success(7_000);
        assert_eq!(tracker.last_sync(), Some(7_000));
    }
}
