//! Long-lived service handles shared by front ends.

mod dashboard;
mod store;

pub use dashboard::{DashboardService, SyncStatus};
pub use store::DurableStore;
