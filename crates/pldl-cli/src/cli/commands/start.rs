//! `pldl start <id>` – download a prepared task and follow its progress.

use super::wait;
use crate::cli::DownloadArgs;
use anyhow::{bail, Result};
use pldl_core::service::DownloadService;
use pldl_core::task_db::TaskStatus;
use std::sync::Arc;

/// Applies the download options, starts the run in the background and
/// prints progress until it finishes. Ctrl-C requests cancellation and keeps
/// waiting for the run to wind down.
pub async fn run_start(
    service: &Arc<DownloadService>,
    id: &str,
    owner: Option<&str>,
    download: &DownloadArgs,
) -> Result<()> {
    service.configure(id, owner, download.to_options()).await?;
    let mut handle = service.start_download(id, owner).await?;

    let mut ticker = tokio::time::interval(wait::POLL_INTERVAL);
    let mut last_line = String::new();
    let mut cancel_sent = false;

    let outcome = loop {
        tokio::select! {
            joined = &mut handle => break joined?,
            _ = ticker.tick() => {
                let task = service.get_task(id).await?;
                let line = wait::progress_line(&task);
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
            }
            res = tokio::signal::ctrl_c(), if !cancel_sent => {
                res?;
                cancel_sent = true;
                println!("Cancelling task {id}...");
                service.request_cancel(id, owner).await?;
            }
        }
    };

    let status = outcome?;
    let task = service.get_task(id).await?;
    match status {
        TaskStatus::Completed => {
            println!("{}", task.message);
            if let Some(path) = task.artifact_path.as_deref() {
                println!("Artifact: {path}");
            }
            Ok(())
        }
        TaskStatus::Cancelled => {
            println!("Task {id} cancelled");
            Ok(())
        }
        other => bail!("task {id} finished as {other}: {}", task.message),
    }
}
