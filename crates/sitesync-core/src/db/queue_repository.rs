//! Write-behind queues for pending mutations and photo uploads

use crate::error::{Error, Result};
use crate::models::{CollectionName, PendingBinary, PendingId, PendingMutation, QueueName};
use libsql::{params, Connection, Row};

use super::finish_transaction;

const MUTATION_COLUMNS: &str = "id, kind, payload, created_at";
const BINARY_COLUMNS: &str =
    "id, bytes, site_id, caption, created_at, file_name, file_type, file_size";

/// Trait for pending queue operations (async)
///
/// Items are always returned oldest-first.
#[allow(async_fn_in_trait)]
pub trait QueueRepository {
    /// Append a mutation and return its id
    async fn enqueue_mutation(&self, mutation: &PendingMutation) -> Result<PendingId>;

    /// List queued mutations without removing them
    async fn list_mutations(&self) -> Result<Vec<PendingMutation>>;

    /// Snapshot and clear the mutation queue in one transaction
    async fn drain_mutations(&self) -> Result<Vec<PendingMutation>>;

    /// Put previously drained mutations back, keeping their ids
    async fn restore_mutations(&self, mutations: &[PendingMutation]) -> Result<()>;

    /// Append a photo upload and return its id
    async fn enqueue_binary(&self, binary: &PendingBinary) -> Result<PendingId>;

    /// List queued photo uploads without removing them
    async fn list_binaries(&self) -> Result<Vec<PendingBinary>>;

    /// Snapshot and clear the photo queue in one transaction
    async fn drain_binaries(&self) -> Result<Vec<PendingBinary>>;

    /// Put previously drained photo uploads back, keeping their ids
    async fn restore_binaries(&self, binaries: &[PendingBinary]) -> Result<()>;

    /// Remove a single item; returns whether it existed
    async fn remove(&self, queue: QueueName, id: &PendingId) -> Result<bool>;

    /// Number of items in a queue
    async fn count(&self, queue: QueueName) -> Result<usize>;
}

/// libSQL implementation of `QueueRepository`
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn insert_mutation(&self, mutation: &PendingMutation) -> Result<()> {
        let payload = serde_json::to_string(&mutation.payload)?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO pending_mutations (id, kind, payload, created_at) VALUES (?, ?, ?, ?)",
                params![
                    mutation.id.as_str(),
                    mutation.kind.as_str(),
                    payload,
                    mutation.created_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_binary(&self, binary: &PendingBinary) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO pending_binaries
                 (id, bytes, site_id, caption, created_at, file_name, file_type, file_size)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    binary.id.as_str(),
                    binary.bytes.clone(),
                    binary.site_id.as_str(),
                    binary.caption.as_str(),
                    binary.created_at,
                    binary.file_name.as_str(),
                    binary.file_type.as_str(),
                    binary.file_size
                ],
            )
            .await?;
        Ok(())
    }

    async fn select_mutations(&self) -> Result<Vec<PendingMutation>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {MUTATION_COLUMNS} FROM pending_mutations ORDER BY created_at ASC, seq ASC"
                ),
                (),
            )
            .await?;

        let mut mutations = Vec::new();
        while let Some(row) = rows.next().await? {
            mutations.push(Self::parse_mutation(&row)?);
        }
        Ok(mutations)
    }

    async fn select_binaries(&self) -> Result<Vec<PendingBinary>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {BINARY_COLUMNS} FROM pending_binaries ORDER BY created_at ASC, seq ASC"
                ),
                (),
            )
            .await?;

        let mut binaries = Vec::new();
        while let Some(row) = rows.next().await? {
            binaries.push(Self::parse_binary(&row)?);
        }
        Ok(binaries)
    }

    /// Parse a mutation from a database row
    fn parse_mutation(row: &Row) -> Result<PendingMutation> {
        let id: String = row.get(0)?;
        let kind: String = row.get(1)?;
        let payload: String = row.get(2)?;
        Ok(PendingMutation {
            id: parse_id(&id)?,
            kind: CollectionName::new(kind)?,
            payload: serde_json::from_str(&payload)?,
            created_at: row.get(3)?,
        })
    }

    /// Parse a photo upload from a database row
    fn parse_binary(row: &Row) -> Result<PendingBinary> {
        let id: String = row.get(0)?;
        Ok(PendingBinary {
            id: parse_id(&id)?,
            bytes: row.get(1)?,
            site_id: row.get(2)?,
            caption: row.get(3)?,
            created_at: row.get(4)?,
            file_name: row.get(5)?,
            file_type: row.get(6)?,
            file_size: row.get(7)?,
        })
    }
}

fn parse_id(raw: &str) -> Result<PendingId> {
    raw.parse()
        .map_err(|_| Error::StorageUnavailable(format!("Corrupt pending item id '{raw}'")))
}

impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn enqueue_mutation(&self, mutation: &PendingMutation) -> Result<PendingId> {
        self.insert_mutation(mutation).await?;
        Ok(mutation.id)
    }

    async fn list_mutations(&self) -> Result<Vec<PendingMutation>> {
        self.select_mutations().await
    }

    async fn drain_mutations(&self) -> Result<Vec<PendingMutation>> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            let mutations = self.select_mutations().await?;
            self.conn.execute("DELETE FROM pending_mutations", ()).await?;
            Ok::<_, Error>(mutations)
        }
        .await;

        finish_transaction(self.conn, result).await
    }

    async fn restore_mutations(&self, mutations: &[PendingMutation]) -> Result<()> {
        if mutations.is_empty() {
            return Ok(());
        }
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            for mutation in mutations {
                self.insert_mutation(mutation).await?;
            }
            Ok::<_, Error>(())
        }
        .await;

        finish_transaction(self.conn, result).await
    }

    async fn enqueue_binary(&self, binary: &PendingBinary) -> Result<PendingId> {
        self.insert_binary(binary).await?;
        Ok(binary.id)
    }

    async fn list_binaries(&self) -> Result<Vec<PendingBinary>> {
        self.select_binaries().await
    }

    async fn drain_binaries(&self) -> Result<Vec<PendingBinary>> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            let binaries = self.select_binaries().await?;
            self.conn.execute("DELETE FROM pending_binaries", ()).await?;
            Ok::<_, Error>(binaries)
        }
        .await;

        finish_transaction(self.conn, result).await
    }

    async fn restore_binaries(&self, binaries: &[PendingBinary]) -> Result<()> {
        if binaries.is_empty() {
            return Ok(());
        }
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            for binary in binaries {
                self.insert_binary(binary).await?;
            }
            Ok::<_, Error>(())
        }
        .await;

        finish_transaction(self.conn, result).await
    }

    async fn remove(&self, queue: QueueName, id: &PendingId) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                &format!("DELETE FROM {} WHERE id = ?", queue.table()),
                [id.as_str()],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn count(&self, queue: QueueName) -> Result<usize> {
        let mut rows = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {}", queue.table()), ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::PhotoUpload;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn mutation(created_at: i64, marker: i64) -> PendingMutation {
        PendingMutation {
            created_at,
            ..PendingMutation::new(CollectionName::progress(), json!({"marker": marker}))
        }
    }

    fn markers(mutations: &[PendingMutation]) -> Vec<i64> {
        mutations
            .iter()
            .map(|m| m.payload["marker"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_lists_oldest_first() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        repo.enqueue_mutation(&mutation(300, 3)).await.unwrap();
        repo.enqueue_mutation(&mutation(100, 1)).await.unwrap();
        repo.enqueue_mutation(&mutation(200, 2)).await.unwrap();

        let listed = repo.list_mutations().await.unwrap();
        assert_eq!(markers(&listed), vec![1, 2, 3]);
        assert_eq!(repo.count(QueueName::Mutations).await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_equal_timestamps_keep_insertion_order() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        for marker in 1..=4 {
            repo.enqueue_mutation(&mutation(500, marker)).await.unwrap();
        }

        let listed = repo.list_mutations().await.unwrap();
        assert_eq!(markers(&listed), vec![1, 2, 3, 4]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_drain_clears_queue() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        let first = mutation(1, 1);
        repo.enqueue_mutation(&first).await.unwrap();
        repo.enqueue_mutation(&mutation(2, 2)).await.unwrap();

        let drained = repo.drain_mutations().await.unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0], first);
        assert_eq!(repo.count(QueueName::Mutations).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_restore_keeps_ids_and_order() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        let old = vec![mutation(10, 1), mutation(20, 2)];
        for item in &old {
            repo.enqueue_mutation(item).await.unwrap();
        }
        let drained = repo.drain_mutations().await.unwrap();

        // Something new arrives while the drained items are in flight
        repo.enqueue_mutation(&mutation(30, 3)).await.unwrap();
        repo.restore_mutations(&drained).await.unwrap();

        let listed = repo.list_mutations().await.unwrap();
        assert_eq!(markers(&listed), vec![1, 2, 3]);
        assert_eq!(listed[0].id, old[0].id);
        assert_eq!(listed[1].id, old[1].id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_single_item() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        let keep = mutation(1, 1);
        let gone = mutation(2, 2);
        repo.enqueue_mutation(&keep).await.unwrap();
        repo.enqueue_mutation(&gone).await.unwrap();

        assert!(repo.remove(QueueName::Mutations, &gone.id).await.unwrap());
        assert!(!repo.remove(QueueName::Mutations, &gone.id).await.unwrap());
        assert_eq!(repo.list_mutations().await.unwrap(), vec![keep]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_binary_bytes_roundtrip() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        let bytes: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let upload = PhotoUpload::new(bytes.clone(), "slab.jpg", "image/jpeg").unwrap();
        let pending = PendingBinary::from_upload(&upload, "4", "slab pour");

        let id = repo.enqueue_binary(&pending).await.unwrap();
        assert_eq!(id, pending.id);

        let drained = repo.drain_binaries().await.unwrap();
        assert_eq!(drained, vec![pending.clone()]);
        assert_eq!(drained[0].to_upload().bytes, bytes);
        assert_eq!(repo.count(QueueName::Binaries).await.unwrap(), 0);

        repo.restore_binaries(&drained).await.unwrap();
        assert_eq!(repo.list_binaries().await.unwrap(), vec![pending]);
    }
}
