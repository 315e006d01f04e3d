//! The single chokepoint for every remote read and write.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{
    require_site_id, CollectionName, PendingBinary, PendingMutation, PhotoUpload, Record,
};
use crate::remote::{PhotoReceipt, RemoteError, RemoteResult, RemoteService};
use crate::services::DurableStore;
use crate::util::unix_millis_now;

use super::{ConnectivityState, StalenessTracker};

/// How a write was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// The write was either delivered or safely queued.
    pub accepted: bool,
    /// The write is waiting in a pending queue.
    pub queued: bool,
}

impl Delivery {
    pub const SENT: Self = Self {
        accepted: true,
        queued: false,
    };
    pub const QUEUED: Self = Self {
        accepted: true,
        queued: true,
    };
    pub const LOST: Self = Self {
        accepted: false,
        queued: false,
    };
}

/// Result of refreshing a set of collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Collections served, with their record counts
    pub collections: Vec<(CollectionName, usize)>,
    /// Collections that could be served neither from the network nor the cache
    pub failed: Vec<CollectionName>,
}

/// Decides per call between the network and the durable store.
pub struct SyncGateway<R> {
    remote: R,
    store: DurableStore,
    tracker: Arc<StalenessTracker>,
    connectivity: ConnectivityState,
    request_timeout: Duration,
    fetch_guards: Mutex<HashMap<CollectionName, Arc<tokio::sync::Mutex<()>>>>,
}

impl<R: RemoteService> SyncGateway<R> {
    pub fn new(
        remote: R,
        store: DurableStore,
        tracker: Arc<StalenessTracker>,
        connectivity: ConnectivityState,
        request_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            store,
            tracker,
            connectivity,
            request_timeout,
            fetch_guards: Mutex::new(HashMap::new()),
        }
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn store(&self) -> &DurableStore {
        &self.store
    }

    pub fn tracker(&self) -> &StalenessTracker {
        &self.tracker
    }

    pub const fn connectivity(&self) -> &ConnectivityState {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Read a collection, preferring the network and falling back to cache.
    ///
    /// Offline reads never touch the network. A successful network read
    /// replaces the cached snapshot and advances the sync cursor.
    pub async fn fetch_collection(
        &self,
        collection: &CollectionName,
        params: &[(String, String)],
    ) -> Result<Vec<Record>> {
        if !self.is_online() {
            tracing::debug!("Offline; serving '{collection}' from cache");
            return Ok(self.cached_or_empty(collection).await);
        }

        let guard = self.fetch_guard(collection);
        let _in_flight = guard.lock().await;

        match self.timed(self.remote.fetch(collection, params)).await {
            Ok(records) => {
                if let Err(error) = self.store.replace_all(collection, &records).await {
                    tracing::warn!("Failed to cache '{collection}': {error}");
                }
                self.tracker.record_sync_success(unix_millis_now());
                tracing::debug!("Fetched {} record(s) of '{collection}'", records.len());
                Ok(records)
            }
            Err(network_error) => {
                tracing::warn!("Fetch of '{collection}' failed, using cache: {network_error}");
                self.store.get_all(collection).await.map_err(|storage_error| {
                    tracing::warn!("Cache read of '{collection}' failed: {storage_error}");
                    Error::FetchFailed {
                        collection: collection.to_string(),
                        reason: network_error.to_string(),
                    }
                })
            }
        }
    }

    /// Fetch every listed collection without extra parameters.
    pub async fn refresh_all(&self, collections: &[CollectionName]) -> RefreshReport {
        let mut report = RefreshReport::default();
        for collection in collections {
            match self.fetch_collection(collection, &[]).await {
                Ok(records) => report.collections.push((collection.clone(), records.len())),
                Err(error) => {
                    tracing::warn!("Refresh of '{collection}' failed: {error}");
                    report.failed.push(collection.clone());
                }
            }
        }
        report
    }

    /// Send an update, queueing it when it cannot be delivered now.
    ///
    /// Offline writes are queued and reported as accepted. An online write
    /// that fails is queued as well, and the failure is returned so the
    /// caller can tell the user.
    pub async fn send_mutation(&self, kind: CollectionName, payload: Record) -> Result<Delivery> {
        if !payload.is_object() {
            return Err(Error::Validation(
                "Update payload must be a JSON object".to_string(),
            ));
        }

        let mutation = PendingMutation::new(kind, payload);
        if !self.is_online() {
            return Ok(self.queue_mutation(&mutation).await);
        }

        match self.deliver_mutation(&mutation).await {
            Ok(()) => Ok(Delivery::SENT),
            Err(error) => {
                tracing::warn!("Send of '{}' failed: {error}", mutation.kind);
                self.queue_mutation(&mutation).await;
                Err(Error::SendFailed {
                    kind: mutation.kind.to_string(),
                    reason: error.to_string(),
                })
            }
        }
    }

    /// Upload a photo, queueing its bytes when it cannot be delivered now.
    pub async fn upload_binary(
        &self,
        photo: &PhotoUpload,
        site_id: &str,
        caption: &str,
    ) -> Result<Delivery> {
        let site_id = require_site_id(site_id)?;
        photo.validate()?;
        let binary = PendingBinary::from_upload(photo, &site_id, caption.trim());
        if !self.is_online() {
            return Ok(self.queue_binary(&binary).await);
        }

        match self.deliver_binary(&binary).await {
            Ok(receipt) => {
                tracing::info!(
                    "Uploaded {} for site {site_id}{}",
                    binary.file_name,
                    receipt.url.map(|url| format!(" ({url})")).unwrap_or_default()
                );
                Ok(Delivery::SENT)
            }
            Err(error) => {
                tracing::warn!("Upload of {} failed: {error}", binary.file_name);
                self.queue_binary(&binary).await;
                Err(Error::SendFailed {
                    kind: CollectionName::photos().to_string(),
                    reason: error.to_string(),
                })
            }
        }
    }

    /// Deliver a queued mutation without re-queueing it on failure.
    pub(crate) async fn deliver_mutation(&self, mutation: &PendingMutation) -> RemoteResult<()> {
        let timestamp = chrono::DateTime::from_timestamp_millis(mutation.created_at)
            .unwrap_or_else(chrono::Utc::now)
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        self.timed(
            self.remote
                .update(&mutation.kind, &mutation.payload, &timestamp),
        )
        .await?;
        self.tracker.record_sync_success(unix_millis_now());
        Ok(())
    }

    /// Deliver a queued photo without re-queueing it on failure.
    pub(crate) async fn deliver_binary(&self, binary: &PendingBinary) -> RemoteResult<PhotoReceipt> {
        let upload = binary.to_upload();
        let receipt = self
            .timed(
                self.remote
                    .upload_photo(&binary.site_id, &binary.caption, &upload),
            )
            .await?;
        self.tracker.record_sync_success(unix_millis_now());
        Ok(receipt)
    }

    async fn queue_mutation(&self, mutation: &PendingMutation) -> Delivery {
        match self.store.enqueue_mutation(mutation).await {
            Ok(id) => {
                tracing::info!("Queued '{}' update {id} for later delivery", mutation.kind);
                Delivery::QUEUED
            }
            Err(error) => {
                tracing::error!(
                    "Lost '{}' update {}; it could not be queued: {error}",
                    mutation.kind,
                    mutation.id
                );
                Delivery::LOST
            }
        }
    }

    async fn queue_binary(&self, binary: &PendingBinary) -> Delivery {
        match self.store.enqueue_binary(binary).await {
            Ok(id) => {
                tracing::info!("Queued photo {} ({id}) for later upload", binary.file_name);
                Delivery::QUEUED
            }
            Err(error) => {
                tracing::error!(
                    "Lost photo {} for site {}; it could not be queued: {error}",
                    binary.file_name,
                    binary.site_id
                );
                Delivery::LOST
            }
        }
    }

    async fn cached_or_empty(&self, collection: &CollectionName) -> Vec<Record> {
        self.store.get_all(collection).await.unwrap_or_else(|error| {
            tracing::warn!("Cache read of '{collection}' failed: {error}");
            Vec::new()
        })
    }

    async fn timed<T>(&self, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| RemoteError::Timeout(self.request_timeout.as_millis()))?
    }

    fn fetch_guard(&self, collection: &CollectionName) -> Arc<tokio::sync::Mutex<()>> {
        let mut guards = self
            .fetch_guards
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guards.entry(collection.clone()).or_default().clone()
    }
}
