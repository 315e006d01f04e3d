use std::future::Future;

use sitesync_core::sync::{spawn_refresh_ticker, ConnectivityEvent};
use tokio::sync::mpsc;

use crate::commands::common::{format_reaction, open_service, GlobalArgs};
use crate::error::CliError;

pub async fn run_watch(args: &GlobalArgs) -> Result<(), CliError> {
    if args.offline {
        return Err(CliError::WatchOffline);
    }

    // Start offline so the first successful probe triggers a full resync.
    let service = open_service(args, false).await?;
    let signal = service.signal();
    let (events, mut receiver) = mpsc::channel::<ConnectivityEvent>(8);

    let monitor = service.monitor().spawn(events.clone());
    let ticker = spawn_refresh_ticker(
        service.gateway().clone(),
        service.config().collections.clone(),
        service.config().refresh_interval(),
    );
    drop(events);

    println!("Watching for changes. Press Ctrl-C to stop.");
    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else { break };
                let (reaction, interrupted) =
                    finish_before_stop(signal.handle(event), tokio::signal::ctrl_c()).await;
                if let Some(message) = format_reaction(&reaction) {
                    println!("{message}");
                }
                if interrupted {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    monitor.abort();
    ticker.abort();
    let status = service.status().await?;
    println!(
        "Stopped with {} update(s) and {} photo(s) pending.",
        status.pending_mutations, status.pending_binaries
    );
    Ok(())
}

/// Drive `work` to completion even if `interrupt` fires first.
///
/// A reconciliation pass holds drained queue items in memory, so it is never
/// cancelled halfway. Returns the output and whether an interrupt arrived.
pub async fn finish_before_stop<W, I>(work: W, interrupt: I) -> (W::Output, bool)
where
    W: Future,
    I: Future,
{
    tokio::pin!(work);
    tokio::select! {
        output = &mut work => (output, false),
        _ = interrupt => {
            println!("Stopping after the current sync finishes...");
            (work.await, true)
        }
    }
}
