//! sitesync-core - Core library for sitesync
//!
//! This crate contains the offline-first sync machinery used by sitesync
//! front ends: the durable cache and write-behind queues, the staleness
//! tracker, the sync gateway, the reconciler and the connectivity signal.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use models::{CollectionName, PendingId, Record};
pub use services::{DashboardService, DurableStore, SyncStatus};
pub use state::SyncState;
pub use sync::{Delivery, ReconcileOutcome, SyncGateway};
