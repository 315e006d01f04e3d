//! Offline-first synchronization.
//!
//! Every read and write goes through [`SyncGateway`], which picks between
//! the remote service and the durable store. [`Reconciler`] replays what was
//! queued while offline, and [`ConnectivitySignal`] ties both to
//! connectivity transitions.

mod connectivity;
mod gateway;
mod reconciler;
mod staleness;

#[cfg(test)]
mod testing;

pub use connectivity::{
    spawn_refresh_ticker, ConnectivityEvent, ConnectivityMonitor, ConnectivitySignal,
    ConnectivityState, Reaction,
};
pub use gateway::{Delivery, RefreshReport, SyncGateway};
pub use reconciler::{
    QueueSummary, ReconcileOutcome, ReconcileSummary, Reconciler, ReconcilerState,
};
pub use staleness::{CursorStore, StalenessTracker, SYNC_STATE_FILE_NAME};

#[cfg(test)]
pub(crate) use testing::{MockRemote, RemoteCall};
