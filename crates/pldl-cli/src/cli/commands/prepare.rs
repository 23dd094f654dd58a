//! `pldl prepare <url>` – create a task and resolve its playlist.

use super::wait;
use anyhow::{bail, Result};
use pldl_core::service::DownloadService;
use pldl_core::task_db::TaskStatus;
use std::sync::Arc;

/// Creates the task, waits for metadata and prints the track list.
/// Returns the task id so `get` can continue with the download.
pub async fn run_prepare(
    service: &Arc<DownloadService>,
    url: &str,
    owner: Option<&str>,
) -> Result<String> {
    let id = service.prepare_task(url, owner).await?;
    println!("Created task {id}");

    let task = wait::until_resolved(service, &id).await?;
    match task.status {
        TaskStatus::Ready => {
            wait::print_tracks(&task);
            println!("{}", task.message);
            Ok(id)
        }
        status => bail!("task {id} is {status}: {}", task.message),
    }
}
