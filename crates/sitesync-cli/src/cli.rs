use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sitesync_core::models::Severity;

#[derive(Parser)]
#[command(name = "sitesync")]
#[command(about = "Offline-first client for the construction site dashboard")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Work from the local cache only; writes are queued
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one collection
    Fetch {
        /// Collection (sheet) name, e.g. sites
        collection: String,
        /// Extra query parameter as key=value
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch every configured collection
    Refresh,
    /// Report progress for a site
    Progress {
        site_id: String,
        /// Completion percentage (0-100)
        #[arg(allow_negative_numbers = true)]
        percentage: i64,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Report an issue on a site
    Issue {
        site_id: String,
        /// Issue description
        #[arg(required = true)]
        description: Vec<String>,
        #[arg(long, value_enum, default_value_t = SeverityArg::Medium)]
        severity: SeverityArg,
    },
    /// Upload a site photo
    Photo {
        site_id: String,
        /// Image file to upload
        path: PathBuf,
        #[arg(long, default_value = "")]
        caption: String,
    },
    /// Inspect or edit the pending queues
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Replay pending writes now
    Reconcile,
    /// Show connectivity, staleness and queue state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing in the foreground until Ctrl-C
    Watch,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List pending writes, oldest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard one pending write
    Drop {
        /// Pending item ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Spreadsheet middleware URL
        #[arg(long)]
        endpoint: String,
        #[arg(long, value_name = "MS")]
        refresh_interval_ms: Option<u64>,
        #[arg(long, value_name = "MS")]
        max_cache_age_ms: Option<u64>,
        #[arg(long, value_name = "MS")]
        request_timeout_ms: Option<u64>,
        #[arg(long, value_name = "MS")]
        probe_interval_ms: Option<u64>,
        /// Comma-separated collections to refresh
        #[arg(long, value_delimiter = ',')]
        collections: Option<Vec<String>>,
        /// Name recorded on reports
        #[arg(long)]
        reported_by: Option<String>,
    },
    /// Print the effective configuration
    Show,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SeverityArg {
    Low,
    Medium,
    High,
}

impl From<SeverityArg> for Severity {
    fn from(value: SeverityArg) -> Self {
        match value {
            SeverityArg::Low => Self::Low,
            SeverityArg::Medium => Self::Medium,
            SeverityArg::High => Self::High,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
