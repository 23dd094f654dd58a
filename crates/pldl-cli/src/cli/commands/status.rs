//! `pldl status [id]` – show one task, or list recent tasks.

use anyhow::Result;
use pldl_core::service::DownloadService;
use pldl_core::task_db::TaskSummary;

pub async fn run_status(
    service: &DownloadService,
    id: Option<&str>,
    owner: Option<&str>,
    limit: u32,
) -> Result<()> {
    match id {
        Some(id) => show_task(service, id).await,
        None => {
            let tasks = service.list(owner, limit).await?;
            if tasks.is_empty() {
                println!("No tasks in database.");
            } else {
                print_summaries(&tasks);
            }
            Ok(())
        }
    }
}

async fn show_task(service: &DownloadService, id: &str) -> Result<()> {
    let task = service.get_task(id).await?;
    println!("Task:     {}", task.id);
    println!("URL:      {}", task.url);
    println!("Status:   {}", task.status);
    println!("Progress: {:.1}%", task.progress);
    println!("Message:  {}", task.message);
    if let Some(path) = task.artifact_path.as_deref() {
        println!("Artifact: {path}");
    }
    if let Some(title) = task.title() {
        println!("Playlist: {title}");
    }
    let selected = task.selected_indices();
    for (i, track) in task.tracks().iter().enumerate() {
        let mark = if selected.contains(&i) { '*' } else { ' ' };
        let status = format!("{:?}", track.status).to_lowercase();
        print!("{mark}{:>4}. {:<11} {} - {}", i + 1, status, track.artist, track.title);
        match track.error.as_deref() {
            Some(err) => println!("  ({err})"),
            None => println!(),
        }
    }
    Ok(())
}

pub(super) fn print_summaries(tasks: &[TaskSummary]) {
    println!("{:<36} {:<11} {:>6}  {}", "ID", "STATUS", "PROG", "TITLE / MESSAGE");
    for t in tasks {
        let label = t.title.as_deref().unwrap_or(&t.message);
        println!(
            "{:<36} {:<11} {:>5.1}%  {}",
            t.id,
            t.status.as_str(),
            t.progress,
            label
        );
    }
}
