use sitesync_core::CollectionName;

use crate::commands::common::{open_service, parse_param, GlobalArgs};
use crate::error::CliError;

pub async fn run_fetch(
    collection: &str,
    params: &[String],
    as_json: bool,
    args: &GlobalArgs,
) -> Result<(), CliError> {
    let collection = CollectionName::new(collection)?;
    let params = params
        .iter()
        .map(|raw| parse_param(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let service = open_service(args, !args.offline).await?;
    let records = service.fetch(&collection, &params).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No records in '{collection}'.");
    } else {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
    }
    Ok(())
}

pub async fn run_refresh(args: &GlobalArgs) -> Result<(), CliError> {
    let service = open_service(args, !args.offline).await?;
    let report = service.refresh_all().await;

    for (collection, count) in &report.collections {
        println!("{collection}: {count} record(s)");
    }
    for collection in &report.failed {
        eprintln!("{collection}: unavailable");
    }
    Ok(())
}
