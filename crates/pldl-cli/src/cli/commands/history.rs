//! `pldl history` – list completed downloads.

use anyhow::Result;
use pldl_core::service::DownloadService;

pub async fn run_history(service: &DownloadService, owner: Option<&str>, limit: u32) -> Result<()> {
    let done = service.history(owner, limit).await?;
    if done.is_empty() {
        println!("No completed downloads.");
        return Ok(());
    }
    for t in done {
        println!(
            "{}  {}  {}",
            t.id,
            t.title.as_deref().unwrap_or("-"),
            t.artifact_path.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
