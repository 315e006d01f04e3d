use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sitesync_core::models::{PendingBinary, PendingMutation};
use sitesync_core::remote::HttpRemote;
use sitesync_core::sync::Reaction;
use sitesync_core::util::compact_text;
use sitesync_core::{ClientConfig, DashboardService, Delivery, Error, ReconcileOutcome};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";

/// Paths and flags shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub offline: bool,
}

impl GlobalArgs {
    pub fn resolve(db_path: Option<PathBuf>, config_path: Option<PathBuf>, offline: bool) -> Self {
        Self {
            db_path: resolve_db_path(db_path),
            config_path: resolve_config_path(config_path),
            offline,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingItem {
    pub queue: &'static str,
    pub id: String,
    pub kind: String,
    pub created_at: i64,
    pub relative_time: String,
    pub summary: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("SITESYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sitesync")
        .join("sitesync.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path
        .or_else(|| env::var_os("SITESYNC_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sitesync")
        .join(CONFIG_FILE_NAME)
}

/// Load the config file and apply `SITESYNC_*` overrides.
pub fn load_config(path: &Path) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::load_from_path(path)?;
    config.apply_env_overrides()?;
    Ok(config)
}

pub async fn open_service(
    args: &GlobalArgs,
    is_online: bool,
) -> Result<DashboardService<HttpRemote>, CliError> {
    let config = load_config(&args.config_path)?;
    Ok(DashboardService::open(config, &args.db_path, is_online).await?)
}

/// Parse a `KEY=VALUE` query parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), CliError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidParam(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidParam(raw.to_string()));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Message for a write that was accepted.
pub fn delivery_notice(subject: &str, delivery: Delivery) -> String {
    match (delivery.accepted, delivery.queued) {
        (true, false) => format!("{subject} sent."),
        (true, true) => {
            format!("{subject} saved offline. Will sync when connection is restored.")
        }
        _ => format!("{subject} could not be saved."),
    }
}

/// Report the outcome of a write, keeping failed-but-queued writes non-fatal.
pub fn report_write(subject: &str, result: Result<Delivery, Error>) -> Result<(), CliError> {
    match result {
        Ok(delivery) => {
            println!("{}", delivery_notice(subject, delivery));
            Ok(())
        }
        Err(Error::SendFailed { reason, .. }) => {
            eprintln!("{subject} could not be sent ({reason}). Saved offline; it will retry on reconnect.");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

pub fn format_outcome(outcome: ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::AlreadyRunning => "Reconciliation already in progress.".to_string(),
        ReconcileOutcome::Offline => "Offline; pending writes were left queued.".to_string(),
        ReconcileOutcome::Completed(summary) if summary.sent() + summary.remaining() == 0 => {
            "Nothing to sync.".to_string()
        }
        ReconcileOutcome::Completed(summary) => format!(
            "Synced {} pending write(s); {} still pending (updates {}/{}, photos {}/{}).",
            summary.sent(),
            summary.remaining(),
            summary.mutations.sent,
            summary.mutations.remaining,
            summary.binaries.sent,
            summary.binaries.remaining
        ),
    }
}

pub fn format_reaction(reaction: &Reaction) -> Option<String> {
    match reaction {
        Reaction::Unchanged => None,
        Reaction::WentOffline => {
            Some("You are offline. Changes will be synced when connection is restored.".to_string())
        }
        Reaction::Resynced { reconcile, refresh } => Some(format!(
            "Back online. {} Refreshed {} collection(s).",
            format_outcome(*reconcile),
            refresh.collections.len()
        )),
        Reaction::Refreshed(refresh) => Some(format!(
            "Refreshed {} collection(s).",
            refresh.collections.len()
        )),
    }
}

pub fn mutation_to_item(mutation: &PendingMutation, now_ms: i64) -> PendingItem {
    PendingItem {
        queue: "mutations",
        id: mutation.id.to_string(),
        kind: mutation.kind.to_string(),
        created_at: mutation.created_at,
        relative_time: format_relative_time(mutation.created_at, now_ms),
        summary: compact_text(&mutation.payload.to_string()),
    }
}

pub fn binary_to_item(binary: &PendingBinary, now_ms: i64) -> PendingItem {
    PendingItem {
        queue: "binaries",
        id: binary.id.to_string(),
        kind: "photo".to_string(),
        created_at: binary.created_at,
        relative_time: format_relative_time(binary.created_at, now_ms),
        summary: format!(
            "site {} {} ({} bytes){}",
            binary.site_id,
            binary.file_name,
            binary.file_size,
            if binary.caption.is_empty() {
                String::new()
            } else {
                format!(" \"{}\"", binary.caption)
            }
        ),
    }
}

pub fn format_pending_lines(items: &[PendingItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{}  {:<10} {:>8}  {}",
                item.id, item.kind, item.relative_time, item.summary
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
