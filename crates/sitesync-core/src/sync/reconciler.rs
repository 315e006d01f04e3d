//! Replays the pending queues once connectivity returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::remote::RemoteService;

use super::SyncGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilerState {
    Idle,
    Draining,
}

/// Per-queue result of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    pub sent: usize,
    /// Items put back for the next pass
    pub remaining: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub mutations: QueueSummary,
    pub binaries: QueueSummary,
}

impl ReconcileSummary {
    pub const fn remaining(&self) -> usize {
        self.mutations.remaining + self.binaries.remaining
    }

    pub const fn sent(&self) -> usize {
        self.mutations.sent + self.binaries.sent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Another pass was already draining the queues.
    AlreadyRunning,
    /// Nothing was attempted because the client is offline.
    Offline,
    Completed(ReconcileSummary),
}

/// Drains both pending queues through the gateway.
pub struct Reconciler<R> {
    gateway: Arc<SyncGateway<R>>,
    draining: AtomicBool,
}

struct DrainingFlag<'a>(&'a AtomicBool);

impl Drop for DrainingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R: RemoteService> Reconciler<R> {
    pub const fn new(gateway: Arc<SyncGateway<R>>) -> Self {
        Self {
            gateway,
            draining: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ReconcilerState {
        if self.draining.load(Ordering::Acquire) {
            ReconcilerState::Draining
        } else {
            ReconcilerState::Idle
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Photos are replayed before updates, each queue oldest first. Only the
    /// items that still fail are written back, with their original ids.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        if !self.gateway.is_online() {
            tracing::debug!("Skipping reconciliation while offline");
            return ReconcileOutcome::Offline;
        }
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Reconciliation already in progress");
            return ReconcileOutcome::AlreadyRunning;
        }
        let _draining = DrainingFlag(&self.draining);

        let summary = self.drain().await;
        tracing::info!(
            "Reconciliation finished: {} sent, {} remaining (mutations {}/{}, photos {}/{})",
            summary.sent(),
            summary.remaining(),
            summary.mutations.sent,
            summary.mutations.remaining,
            summary.binaries.sent,
            summary.binaries.remaining
        );
        ReconcileOutcome::Completed(summary)
    }

    async fn drain(&self) -> ReconcileSummary {
        let store = self.gateway.store();
        let binaries = store.drain_binaries().await.unwrap_or_else(|error| {
            tracing::warn!("Could not read queued photos: {error}");
            Vec::new()
        });
        let mutations = store.drain_mutations().await.unwrap_or_else(|error| {
            tracing::warn!("Could not read queued updates: {error}");
            Vec::new()
        });

        let mut summary = ReconcileSummary::default();

        let mut failed_binaries = Vec::new();
        for binary in binaries {
            if !self.gateway.is_online() {
                failed_binaries.push(binary);
                continue;
            }
            match self.gateway.deliver_binary(&binary).await {
                Ok(_) => summary.binaries.sent += 1,
                Err(error) => {
                    tracing::warn!("Replay of photo {} failed: {error}", binary.id);
                    failed_binaries.push(binary);
                }
            }
        }

        let mut failed_mutations = Vec::new();
        for mutation in mutations {
            if !self.gateway.is_online() {
                failed_mutations.push(mutation);
                continue;
            }
            match self.gateway.deliver_mutation(&mutation).await {
                Ok(()) => summary.mutations.sent += 1,
                Err(error) => {
                    tracing::warn!(
                        "Replay of '{}' update {} failed: {error}",
                        mutation.kind,
                        mutation.id
                    );
                    failed_mutations.push(mutation);
                }
            }
        }

        summary.binaries.remaining = failed_binaries.len();
        summary.mutations.remaining = failed_mutations.len();

        if !failed_binaries.is_empty() {
            if let Err(error) = store.restore_binaries(&failed_binaries).await {
                tracing::error!(
                    "Lost {} queued photo(s); they could not be re-queued: {error}",
                    failed_binaries.len()
                );
            }
        }
        if !failed_mutations.is_empty() {
            if let Err(error) = store.restore_mutations(&failed_mutations).await {
                tracing::error!(
                    "Lost {} queued update(s); they could not be re-queued: {error}",
                    failed_mutations.len()
                );
            }
        }

        summary
    }
}
