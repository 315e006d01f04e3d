use std::path::Path;

use sitesync_core::models::{PhotoUpload, Severity};

use crate::commands::common::{open_service, report_write, GlobalArgs};
use crate::error::CliError;

pub async fn run_progress(
    site_id: &str,
    percentage: i64,
    notes: Option<String>,
    args: &GlobalArgs,
) -> Result<(), CliError> {
    let service = open_service(args, !args.offline).await?;
    let result = service.submit_progress(site_id, percentage, notes).await;
    report_write("Progress update", result)
}

pub async fn run_issue(
    site_id: &str,
    description: &[String],
    severity: Severity,
    args: &GlobalArgs,
) -> Result<(), CliError> {
    let description = description.join(" ");
    let service = open_service(args, !args.offline).await?;
    let result = service.report_issue(site_id, &description, severity).await;
    report_write("Issue report", result)
}

pub async fn run_photo(
    site_id: &str,
    path: &Path,
    caption: &str,
    args: &GlobalArgs,
) -> Result<(), CliError> {
    let photo = read_photo(path)?;
    let service = open_service(args, !args.offline).await?;
    let result = service.upload_photo(site_id, &photo, caption).await;
    report_write("Photo", result)
}

pub fn read_photo(path: &Path) -> Result<PhotoUpload, CliError> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(PhotoUpload::new(bytes, file_name, "")?)
}
