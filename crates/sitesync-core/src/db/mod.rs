//! Database layer for the local cache and write-behind queues

mod collection_repository;
mod connection;
mod migrations;
mod queue_repository;

pub use collection_repository::{CollectionRepository, LibSqlCollectionRepository};
pub use connection::Database;
pub use queue_repository::{LibSqlQueueRepository, QueueRepository};

use crate::error::Result;
use libsql::Connection;

/// Commit when `result` is Ok, roll back otherwise.
///
/// The caller must have issued `BEGIN TRANSACTION` on `conn`.
pub(crate) async fn finish_transaction<T>(conn: &Connection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            if let Err(e) = conn.execute("COMMIT", ()).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
            Ok(value)
        }
        Err(error) => {
            conn.execute("ROLLBACK", ()).await.ok();
            Err(error)
        }
    }
}
