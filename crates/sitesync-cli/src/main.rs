//! sitesync CLI - offline-first client for the construction site dashboard
//!
//! Reads go through the local cache when the network is unavailable and
//! writes are queued until they can be delivered.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands, QueueCommands};
use crate::commands::common::GlobalArgs;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::fetch::{run_fetch, run_refresh};
use crate::commands::queue::{run_queue_drop, run_queue_list};
use crate::commands::reconcile::run_reconcile;
use crate::commands::status::run_status;
use crate::commands::watch::run_watch;
use crate::commands::write::{run_issue, run_photo, run_progress};
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sitesync=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let args = GlobalArgs::resolve(cli.db_path, cli.config, cli.offline);

    match cli.command {
        Commands::Fetch {
            collection,
            params,
            json,
        } => run_fetch(&collection, &params, json, &args).await,
        Commands::Refresh => run_refresh(&args).await,
        Commands::Progress {
            site_id,
            percentage,
            notes,
        } => run_progress(&site_id, percentage, notes, &args).await,
        Commands::Issue {
            site_id,
            description,
            severity,
        } => run_issue(&site_id, &description, severity.into(), &args).await,
        Commands::Photo {
            site_id,
            path,
            caption,
        } => run_photo(&site_id, &path, &caption, &args).await,
        Commands::Queue { command } => match command {
            QueueCommands::List { json } => run_queue_list(json, &args).await,
            QueueCommands::Drop { id } => run_queue_drop(&id, &args).await,
        },
        Commands::Reconcile => run_reconcile(&args).await,
        Commands::Status { json } => run_status(json, &args).await,
        Commands::Watch => run_watch(&args).await,
        Commands::Config { command } => run_config(command, &args.config_path),
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}
