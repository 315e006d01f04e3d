//! Dashboard service: one context object wiring the sync components together.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::models::{
    CollectionName, IssueReport, PhotoUpload, ProgressUpdate, Record, Severity,
};
use crate::remote::{HttpRemote, RemoteService};
use crate::state::SyncState;
use crate::sync::{
    ConnectivityMonitor, ConnectivitySignal, ConnectivityState, Delivery, ReconcileOutcome,
    Reconciler, ReconcilerState, RefreshReport, StalenessTracker, SyncGateway,
};

use super::DurableStore;

/// Point-in-time view of the sync machinery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub is_online: bool,
    /// Last successful sync (Unix ms)
    pub last_sync: Option<i64>,
    pub is_stale: bool,
    pub pending_mutations: usize,
    pub pending_binaries: usize,
}

/// Owns the store, tracker, gateway and reconciler for one client.
pub struct DashboardService<R> {
    config: ClientConfig,
    gateway: Arc<SyncGateway<R>>,
    reconciler: Arc<Reconciler<R>>,
}

impl DashboardService<HttpRemote> {
    /// Open the service against the configured endpoint.
    ///
    /// The sync cursor is kept in a state file next to `db_path`.
    pub async fn open(config: ClientConfig, db_path: &Path, is_online: bool) -> Result<Self> {
        let remote = HttpRemote::new(config.require_endpoint()?)?;
        let store = DurableStore::open_path(db_path).await?;
        let tracker = StalenessTracker::beside_database(db_path, config.max_cache_age());
        Ok(Self::from_parts(
            config,
            remote,
            store,
            tracker,
            ConnectivityState::new(is_online),
        ))
    }

    /// A reachability monitor probing the same endpoint.
    pub fn monitor(&self) -> ConnectivityMonitor<HttpRemote> {
        ConnectivityMonitor::new(
            self.gateway.remote().clone(),
            self.config.probe_interval(),
            self.config.request_timeout(),
        )
    }
}

impl<R: RemoteService> DashboardService<R> {
    pub fn from_parts(
        config: ClientConfig,
        remote: R,
        store: DurableStore,
        tracker: StalenessTracker,
        connectivity: ConnectivityState,
    ) -> Self {
        let gateway = Arc::new(SyncGateway::new(
            remote,
            store,
            Arc::new(tracker),
            connectivity,
            config.request_timeout(),
        ));
        let reconciler = Arc::new(Reconciler::new(gateway.clone()));
        Self {
            config,
            gateway,
            reconciler,
        }
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub const fn gateway(&self) -> &Arc<SyncGateway<R>> {
        &self.gateway
    }

    pub const fn reconciler(&self) -> &Arc<Reconciler<R>> {
        &self.reconciler
    }

    pub fn store(&self) -> &DurableStore {
        self.gateway.store()
    }

    /// A connectivity signal refreshing the configured collections.
    pub fn signal(&self) -> ConnectivitySignal<R> {
        ConnectivitySignal::new(
            self.gateway.clone(),
            self.reconciler.clone(),
            self.config.collections.clone(),
        )
    }

    pub async fn fetch(
        &self,
        collection: &CollectionName,
        params: &[(String, String)],
    ) -> Result<Vec<Record>> {
        self.gateway.fetch_collection(collection, params).await
    }

    /// Fetch every configured collection.
    pub async fn refresh_all(&self) -> RefreshReport {
        self.gateway.refresh_all(&self.config.collections).await
    }

    pub async fn submit_progress(
        &self,
        site_id: &str,
        percentage: i64,
        notes: Option<String>,
    ) -> Result<Delivery> {
        let update = ProgressUpdate::new(site_id, percentage, notes, &self.config.reported_by)?;
        self.gateway
            .send_mutation(CollectionName::progress(), serde_json::to_value(update)?)
            .await
    }

    pub async fn report_issue(
        &self,
        site_id: &str,
        description: &str,
        severity: Severity,
    ) -> Result<Delivery> {
        let issue = IssueReport::new(site_id, description, severity, &self.config.reported_by)?;
        self.gateway
            .send_mutation(CollectionName::issues(), serde_json::to_value(issue)?)
            .await
    }

    pub async fn upload_photo(
        &self,
        site_id: &str,
        photo: &PhotoUpload,
        caption: &str,
    ) -> Result<Delivery> {
        self.gateway.upload_binary(photo, site_id, caption).await
    }

    pub async fn reconcile(&self) -> ReconcileOutcome {
        self.reconciler.reconcile().await
    }

    pub async fn status(&self) -> Result<SyncStatus> {
        let (pending_mutations, pending_binaries) = self.store().pending_counts().await?;
        let tracker = self.gateway.tracker();
        let is_online = self.gateway.is_online();
        let is_stale = tracker.is_stale();
        let is_draining = self.reconciler.state() == ReconcilerState::Draining;

        Ok(SyncStatus {
            state: SyncState::derive(
                is_online,
                is_draining,
                pending_mutations + pending_binaries,
                is_stale,
            ),
            is_online,
            last_sync: tracker.last_sync(),
            is_stale,
            pending_mutations,
            pending_binaries,
        })
    }
}
