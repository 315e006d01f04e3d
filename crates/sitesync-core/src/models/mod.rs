//! Data models for sitesync

mod collection;
mod pending;
mod report;

pub use collection::{
    CollectionName, Record, DEFAULT_COLLECTIONS, EQUIPMENT, ISSUES, PHOTOS, PROGRESS, SITES,
    UPDATES,
};
pub use pending::{
    mime_for_file_name, PendingBinary, PendingId, PendingMutation, PhotoUpload, QueueName,
};
pub use report::{IssueReport, ProgressUpdate, Severity};
pub(crate) use report::require_site_id;
