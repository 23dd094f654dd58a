//! `pldl cancel <id>` – request cancellation.

use anyhow::Result;
use pldl_core::service::DownloadService;

pub async fn run_cancel(service: &DownloadService, id: &str, owner: Option<&str>) -> Result<()> {
    service.request_cancel(id, owner).await?;
    let task = service.get_task(id).await?;
    println!("Task {id}: {} ({})", task.status, task.message);
    Ok(())
}
