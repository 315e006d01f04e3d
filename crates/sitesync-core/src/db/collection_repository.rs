//! Cached collection snapshots

use crate::error::{Error, Result};
use crate::models::{CollectionName, Record};
use libsql::{params, Connection};

use super::finish_transaction;

/// Trait for collection snapshot storage operations (async)
#[allow(async_fn_in_trait)]
pub trait CollectionRepository {
    /// All cached records of a collection, in remote order
    async fn get_all(&self, collection: &CollectionName) -> Result<Vec<Record>>;

    /// Replace the whole snapshot of a collection
    async fn replace_all(&self, collection: &CollectionName, records: &[Record]) -> Result<()>;

    /// Number of cached records for a collection
    async fn count(&self, collection: &CollectionName) -> Result<usize>;
}

/// libSQL implementation of `CollectionRepository`
pub struct LibSqlCollectionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCollectionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CollectionRepository for LibSqlCollectionRepository<'_> {
    async fn get_all(&self, collection: &CollectionName) -> Result<Vec<Record>> {
        let mut rows = self
            .conn
            .query(
                "SELECT record FROM collection_records WHERE collection = ? ORDER BY position ASC",
                [collection.as_str()],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            records.push(serde_json::from_str(&raw)?);
        }
        Ok(records)
    }

    async fn replace_all(&self, collection: &CollectionName, records: &[Record]) -> Result<()> {
        // Serialize up front so a bad record cannot leave the table half-written
        let serialized = records
            .iter()
            .map(serde_json::to_string)
            .collect::<serde_json::Result<Vec<_>>>()?;

        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            self.conn
                .execute(
                    "DELETE FROM collection_records WHERE collection = ?",
                    [collection.as_str()],
                )
                .await?;

            for (position, record) in serialized.into_iter().enumerate() {
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                self.conn
                    .execute(
                        "INSERT INTO collection_records (collection, position, record) VALUES (?, ?, ?)",
                        params![collection.as_str(), position, record],
                    )
                    .await?;
            }
            Ok::<_, Error>(())
        }
        .await;

        finish_transaction(self.conn, result).await
    }

    async fn count(&self, collection: &CollectionName) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM collection_records WHERE collection = ?",
                [collection.as_str()],
            )
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
