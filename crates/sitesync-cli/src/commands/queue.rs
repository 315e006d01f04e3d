use sitesync_core::models::{PendingId, QueueName};
use sitesync_core::util::unix_millis_now;
use sitesync_core::DurableStore;

use crate::commands::common::{
    binary_to_item, format_pending_lines, mutation_to_item, GlobalArgs, PendingItem,
};
use crate::error::CliError;

pub async fn list_pending(args: &GlobalArgs) -> Result<Vec<PendingItem>, CliError> {
    let store = DurableStore::open_path(&args.db_path).await?;
    let now = unix_millis_now();

    let mut items = store
        .pending_binaries()
        .await?
        .iter()
        .map(|binary| binary_to_item(binary, now))
        .collect::<Vec<_>>();
    items.extend(
        store
            .pending_mutations()
            .await?
            .iter()
            .map(|mutation| mutation_to_item(mutation, now)),
    );
    Ok(items)
}

pub async fn run_queue_list(as_json: bool, args: &GlobalArgs) -> Result<(), CliError> {
    let items = list_pending(args).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No pending writes.");
    } else {
        for line in format_pending_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_queue_drop(id: &str, args: &GlobalArgs) -> Result<(), CliError> {
    let id = id.trim();
    let pending_id: PendingId = id
        .parse()
        .map_err(|_| CliError::InvalidPendingId(id.to_string()))?;

    let store = DurableStore::open_path(&args.db_path).await?;
    for queue in [QueueName::Mutations, QueueName::Binaries] {
        if store.remove(queue, &pending_id).await? {
            println!("Dropped pending {queue} item {pending_id}");
            return Ok(());
        }
    }
    Err(CliError::PendingNotFound(pending_id.to_string()))
}
