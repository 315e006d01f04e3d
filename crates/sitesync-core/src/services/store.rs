//! Durable store: the local cache and write-behind queues behind one handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    CollectionRepository, Database, LibSqlCollectionRepository, LibSqlQueueRepository,
    QueueRepository,
};
use crate::models::{CollectionName, PendingBinary, PendingId, PendingMutation, QueueName, Record};
use crate::{Error, Result};

/// Thread-safe handle to the local database.
///
/// Every operation takes the connection lock for its whole duration, so a
/// multi-statement operation such as [`DurableStore::replace_all`] is never
/// observed half-done by another caller.
#[derive(Clone)]
pub struct DurableStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DurableStore {
    /// Open the store at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh store is
    /// created in its place.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Cache database at {} is unreadable: {}. Resetting it.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location of the store, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .map_or_else(|| "sitesync.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted cache database from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale cache sidecar file {}", path.display());
            }
        }

        Ok(())
    }

    async fn reopen_after_corruption(&self) -> Result<bool> {
        let Some(db_path) = self.db_path.clone() else {
            return Ok(false);
        };

        tracing::warn!(
            "Detected invalid cache database; reopening at {}",
            db_path.display()
        );

        let mut db = self.db.lock().await;
        let placeholder = Database::open_in_memory().await?;
        drop(std::mem::replace(&mut *db, placeholder));

        Self::quarantine_corrupted_db_files(&db_path)?;
        *db = Database::open(&db_path).await?;
        Ok(true)
    }

    /// All cached records of a collection.
    pub async fn get_all(&self, collection: &CollectionName) -> Result<Vec<Record>> {
        let first_attempt = {
            let db = self.db.lock().await;
            let repo = LibSqlCollectionRepository::new(db.connection());
            repo.get_all(collection).await
        };

        match first_attempt {
            Ok(records) => Ok(records),
            Err(error) if Self::is_corrupted_db_error(&error) => {
                if self.reopen_after_corruption().await? {
                    let db = self.db.lock().await;
                    let repo = LibSqlCollectionRepository::new(db.connection());
                    repo.get_all(collection).await
                } else {
                    Err(error)
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Atomically replace the snapshot of a collection.
    pub async fn replace_all(&self, collection: &CollectionName, records: &[Record]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlCollectionRepository::new(db.connection());
        repo.replace_all(collection, records).await
    }

    /// Number of cached records for a collection.
    pub async fn cached_count(&self, collection: &CollectionName) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlCollectionRepository::new(db.connection());
        repo.count(collection).await
    }

    /// Queue a mutation.
    pub async fn enqueue_mutation(&self, mutation: &PendingMutation) -> Result<PendingId> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.enqueue_mutation(mutation).await
    }

    /// Queue a photo upload.
    pub async fn enqueue_binary(&self, binary: &PendingBinary) -> Result<PendingId> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.enqueue_binary(binary).await
    }

    /// Queued mutations, oldest first.
    pub async fn pending_mutations(&self) -> Result<Vec<PendingMutation>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list_mutations().await
    }

    /// Queued photo uploads, oldest first.
    pub async fn pending_binaries(&self) -> Result<Vec<PendingBinary>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list_binaries().await
    }

    /// Take every queued mutation, leaving the queue empty.
    pub async fn drain_mutations(&self) -> Result<Vec<PendingMutation>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.drain_mutations().await
    }

    /// Take every queued photo upload, leaving the queue empty.
    pub async fn drain_binaries(&self) -> Result<Vec<PendingBinary>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.drain_binaries().await
    }

    /// Put mutations back into the queue with their original ids.
    pub async fn restore_mutations(&self, mutations: &[PendingMutation]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.restore_mutations(mutations).await
    }

    /// Put photo uploads back into the queue with their original ids.
    pub async fn restore_binaries(&self, binaries: &[PendingBinary]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.restore_binaries(binaries).await
    }

    /// Delete one queued item.
    pub async fn remove(&self, queue: QueueName, id: &PendingId) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.remove(queue, id).await
    }

    /// Number of queued (mutations, binaries).
    pub async fn pending_counts(&self) -> Result<(usize, usize)> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        let mutations = repo.count(QueueName::Mutations).await?;
        let binaries = repo.count(QueueName::Binaries).await?;
        Ok((mutations, binaries))
    }

    /// Drop one backing table so every later call touching it fails.
    #[cfg(test)]
    pub(crate) async fn drop_table(&self, table: &str) {
        let db = self.db.lock().await;
        db.connection()
            .execute(&format!("DROP TABLE {table}"), ())
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_replace_and_read() {
        let store = DurableStore::open_in_memory().await.unwrap();
        let sites = CollectionName::new("sites").unwrap();

        store
            .replace_all(&sites, &[json!({"id": "1"})])
            .await
            .unwrap();
        assert_eq!(store.get_all(&sites).await.unwrap().len(), 1);
        assert_eq!(store.cached_count(&sites).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queued_items_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sitesync.db");

        let mutation = PendingMutation::new(CollectionName::progress(), json!({"siteId": "1"}));
        {
            let store = DurableStore::open_path(&path).await.unwrap();
            store.enqueue_mutation(&mutation).await.unwrap();
        }

        let reopened = DurableStore::open_path(&path).await.unwrap();
        assert_eq!(reopened.pending_mutations().await.unwrap(), vec![mutation]);
        assert_eq!(reopened.pending_counts().await.unwrap(), (1, 0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupt_file_is_replaced_on_open() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sitesync.db");
        std::fs::write(&path, b"definitely not sqlite, just some bytes padded out to a page")
            .unwrap();

        let store = DurableStore::open_path(&path).await.unwrap();
        assert_eq!(store.pending_counts().await.unwrap(), (0, 0));

        let backups = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("sitesync.db.corrupt-")
            })
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn detects_corruption_messages() {
        assert!(DurableStore::is_corrupted_db_error(
            &Error::StorageUnavailable("SQLite failure: file is not a database".to_string())
        ));
        assert!(!DurableStore::is_corrupted_db_error(&Error::Validation(
            "Site ID is required".to_string()
        )));
    }

    #[test]
    fn quarantine_moves_db_and_removes_sidecars() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("sitesync.db");
        let wal_path = tmp.path().join("sitesync.db-wal");
        std::fs::write(&db_path, b"bad-db").unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();

        DurableStore::quarantine_corrupted_db_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!wal_path.exists());
    }
}
