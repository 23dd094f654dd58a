//! `pldl remove <id>` – remove a task; optionally delete its artifact with --delete-files.

use anyhow::Result;
use pldl_core::service::DownloadService;

pub async fn run_remove(
    service: &DownloadService,
    id: &str,
    owner: Option<&str>,
    delete_files: bool,
) -> Result<()> {
    service.delete_task(id, owner, delete_files).await?;
    println!("Removed task {id}");
    Ok(())
}
