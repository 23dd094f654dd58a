//! CLI for the PLDL playlist downloader.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pldl_core::config;
use pldl_core::service::DownloadService;
use pldl_core::task_db::{TaskDb, TaskOptions};
use std::path::Path;

use commands::{
    run_cancel, run_checksum, run_get, run_history, run_prepare, run_recover, run_remove,
    run_start, run_status,
};

#[derive(Debug, Parser)]
#[command(name = "pldl")]
#[command(about = "PLDL: playlist download orchestrator", long_about = None)]
pub struct Cli {
    /// Device identity that owns the tasks you create and act on.
    #[arg(long, global = true, value_name = "ID")]
    pub owner: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Choices applied before a download starts.
#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Tracks to download, 1-based and comma-separated (default: all).
    #[arg(long, value_delimiter = ',', value_name = "N,N,...")]
    pub select: Vec<usize>,

    /// Audio format passed to the extractor.
    #[arg(long, default_value = "mp3")]
    pub format: String,

    /// Filename template: {title}, {artist}, {album}, {year}, {track_number}.
    #[arg(long, default_value = "{title}")]
    pub template: String,
}

impl DownloadArgs {
    pub fn to_options(&self) -> TaskOptions {
        TaskOptions {
            selected_indices: self
                .select
                .iter()
                .filter(|&&n| n > 0)
                .map(|n| n - 1)
                .collect(),
            format: self.format.clone(),
            filename_template: self.template.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Create a task for a playlist URL and resolve its tracks.
    Prepare {
        url: String,
    },

    /// Download a prepared task and wait for the artifact.
    Start {
        /// Task identifier.
        id: String,
        #[command(flatten)]
        download: DownloadArgs,
    },

    /// Prepare and download a playlist in one step.
    Get {
        url: String,
        #[command(flatten)]
        download: DownloadArgs,
    },

    /// Show one task in detail, or list recent tasks.
    Status {
        id: Option<String>,
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// List completed downloads.
    History {
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Request cancellation of a task.
    Cancel {
        id: String,
    },

    /// Remove a task; optionally delete its artifact with --delete-files.
    Remove {
        id: String,
        #[arg(long)]
        delete_files: bool,
    },

    /// Compute SHA-256 of a file (e.g. a finished artifact).
    Checksum {
        path: String,
    },

    /// Mark tasks interrupted by a crash or restart as failed.
    /// Run only while no other pldl process is downloading.
    Recover,
}

impl Cli {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let owner = cli.owner.as_deref();

        if let CliCommand::Checksum { path } = &cli.command {
            return run_checksum(Path::new(path)).await;
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = TaskDb::open_default().await?;
        let service = DownloadService::from_config(&cfg, db).await?;

        match cli.command {
            CliCommand::Prepare { url } => {
                run_prepare(&service, &url, owner).await?;
            }
            CliCommand::Start { id, download } => {
                run_start(&service, &id, owner, &download).await?;
            }
            CliCommand::Get { url, download } => {
                run_get(&service, &url, owner, &download).await?;
            }
            CliCommand::Status { id, limit } => {
                run_status(&service, id.as_deref(), owner, limit).await?
            }
            CliCommand::History { limit } => run_history(&service, owner, limit).await?,
            CliCommand::Cancel { id } => run_cancel(&service, &id, owner).await?,
            CliCommand::Remove { id, delete_files } => {
                run_remove(&service, &id, owner, delete_files).await?
            }
            CliCommand::Recover => run_recover(&service).await?,
            CliCommand::Checksum { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
