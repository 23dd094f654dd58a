//! Polling helpers shared by `prepare`, `start` and `get`.

use anyhow::Result;
use pldl_core::service::DownloadService;
use pldl_core::task_db::{TaskRecord, TaskStatus};
use std::time::Duration;

pub(super) const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Wait until metadata resolution has settled (ready, error or cancelled).
pub(super) async fn until_resolved(service: &DownloadService, task_id: &str) -> Result<TaskRecord> {
    loop {
        let task = service.get_task(task_id).await?;
        if !matches!(task.status, TaskStatus::Pending | TaskStatus::Preparing) {
            return Ok(task);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// One-line progress view of a task record.
pub(super) fn progress_line(task: &TaskRecord) -> String {
    format!(
        "[{:>5.1}%] {:<11} {}",
        task.progress,
        task.status.as_str(),
        task.message
    )
}

pub(super) fn print_tracks(task: &TaskRecord) {
    if let Some(title) = task.title() {
        println!("Playlist: {title}");
    }
    for (i, track) in task.tracks().iter().enumerate() {
        println!("{:>4}. {} - {}", i + 1, track.artist, track.title);
    }
}
