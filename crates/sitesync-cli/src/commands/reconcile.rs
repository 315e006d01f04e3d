use crate::commands::common::{format_outcome, open_service, GlobalArgs};
use crate::error::CliError;

pub async fn run_reconcile(args: &GlobalArgs) -> Result<(), CliError> {
    let service = open_service(args, !args.offline).await?;
    let outcome = service.reconcile().await;
    println!("{}", format_outcome(outcome));
    Ok(())
}
