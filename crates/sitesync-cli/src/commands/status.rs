use crate::commands::common::{format_sync_timestamp, open_service, GlobalArgs};
use crate::error::CliError;

pub async fn run_status(as_json: bool, args: &GlobalArgs) -> Result<(), CliError> {
    let service = open_service(args, !args.offline).await?;
    let status = service.status().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let state = serde_json::to_value(status.state)?;
    println!("State:     {}", state.as_str().unwrap_or_default());
    println!(
        "Network:   {}",
        if status.is_online { "online" } else { "offline" }
    );
    println!(
        "Last sync: {}{}",
        status
            .last_sync
            .map_or_else(|| "never".to_string(), format_sync_timestamp),
        if status.is_stale { " (stale)" } else { "" }
    );
    println!(
        "Pending:   {} update(s), {} photo(s)",
        status.pending_mutations, status.pending_binaries
    );
    Ok(())
}
