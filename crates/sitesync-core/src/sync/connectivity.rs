//! Online/offline state and the reactions to its transitions.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::CollectionName;
use crate::remote::RemoteService;

use super::{RefreshReport, ReconcileOutcome, Reconciler, SyncGateway};

/// Process-wide connectivity flag.
///
/// Cloning shares the same flag. Readers can await transitions through
/// [`ConnectivityState::subscribe`].
#[derive(Debug, Clone)]
pub struct ConnectivityState {
    sender: Arc<watch::Sender<bool>>,
}

impl ConnectivityState {
    pub fn new(is_online: bool) -> Self {
        let (sender, _) = watch::channel(is_online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Set the flag, returning whether it changed.
    pub(crate) fn set_online(&self, is_online: bool) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == is_online {
                false
            } else {
                *current = is_online;
                true
            }
        })
    }
}

/// Environment events fed into the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityEvent {
    Online,
    Offline,
    Foreground,
    Background,
}

/// What the signal did in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// The event did not change anything.
    Unchanged,
    WentOffline,
    /// Back online: queues replayed, then collections refreshed.
    Resynced {
        reconcile: ReconcileOutcome,
        refresh: RefreshReport,
    },
    /// Foregrounded with a stale cache.
    Refreshed(RefreshReport),
}

/// Owns connectivity transitions and triggers reconciliation and refresh.
pub struct ConnectivitySignal<R> {
    gateway: Arc<SyncGateway<R>>,
    reconciler: Arc<Reconciler<R>>,
    collections: Vec<CollectionName>,
}

impl<R: RemoteService> ConnectivitySignal<R> {
    pub const fn new(
        gateway: Arc<SyncGateway<R>>,
        reconciler: Arc<Reconciler<R>>,
        collections: Vec<CollectionName>,
    ) -> Self {
        Self {
            gateway,
            reconciler,
            collections,
        }
    }

    pub fn state(&self) -> &ConnectivityState {
        self.gateway.connectivity()
    }

    pub async fn handle(&self, event: ConnectivityEvent) -> Reaction {
        match event {
            ConnectivityEvent::Online => {
                if !self.state().set_online(true) {
                    return Reaction::Unchanged;
                }
                tracing::info!("Connection restored; syncing pending changes");
                let reconcile = self.reconciler.reconcile().await;
                let refresh = self.gateway.refresh_all(&self.collections).await;
                Reaction::Resynced { reconcile, refresh }
            }
            ConnectivityEvent::Offline => {
                if self.state().set_online(false) {
                    tracing::info!("Connection lost; changes will be queued");
                    Reaction::WentOffline
                } else {
                    Reaction::Unchanged
                }
            }
            ConnectivityEvent::Foreground => {
                if self.gateway.tracker().is_stale() {
                    tracing::debug!("Foregrounded with stale cache; refreshing");
                    Reaction::Refreshed(self.gateway.refresh_all(&self.collections).await)
                } else {
                    Reaction::Unchanged
                }
            }
            ConnectivityEvent::Background => {
                tracing::debug!("Moved to background");
                Reaction::Unchanged
            }
        }
    }

    /// Handle events until the sending side closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ConnectivityEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        tracing::debug!("Connectivity event stream closed");
    }
}

/// Probes the remote endpoint and reports reachability changes.
pub struct ConnectivityMonitor<R> {
    remote: R,
    interval: Duration,
    timeout: Duration,
}

impl<R: RemoteService + 'static> ConnectivityMonitor<R> {
    pub const fn new(remote: R, interval: Duration, timeout: Duration) -> Self {
        Self {
            remote,
            interval,
            timeout,
        }
    }

    /// Whether the endpoint answered within the timeout.
    pub async fn probe(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.remote.ping()).await,
            Ok(Ok(()))
        )
    }

    /// Probe on every interval and emit `Online`/`Offline` when reachability
    /// changes. The first probe always emits. Stops when the receiver is gone.
    pub async fn run(self, events: mpsc::Sender<ConnectivityEvent>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = None;

        loop {
            ticker.tick().await;
            if events.is_closed() {
                break;
            }
            let reachable = self.probe().await;
            if last == Some(reachable) {
                continue;
            }
            last = Some(reachable);

            let event = if reachable {
                ConnectivityEvent::Online
            } else {
                ConnectivityEvent::Offline
            };
            if events.send(event).await.is_err() {
                break;
            }
        }
    }

    pub fn spawn(self, events: mpsc::Sender<ConnectivityEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}

/// Refresh every collection on each interval tick while online.
pub fn spawn_refresh_ticker<R: RemoteService + 'static>(
    gateway: Arc<SyncGateway<R>>,
    collections: Vec<CollectionName>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if gateway.is_online() {
                let report = gateway.refresh_all(&collections).await;
                tracing::debug!(
                    "Interval refresh: {} served, {} failed",
                    report.collections.len(),
                    report.failed.len()
                );
            }
        }
    })
}
