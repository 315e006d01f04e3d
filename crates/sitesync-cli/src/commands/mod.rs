pub mod common;
pub mod completions;
pub mod config;
pub mod fetch;
pub mod queue;
pub mod reconcile;
pub mod status;
pub mod watch;
pub mod write;
