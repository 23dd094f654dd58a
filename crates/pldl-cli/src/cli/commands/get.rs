//! `pldl get <url>` – prepare and download in one step.

use super::{run_prepare, run_start};
use crate::cli::DownloadArgs;
use anyhow::Result;
use pldl_core::service::DownloadService;
use std::sync::Arc;

pub async fn run_get(
    service: &Arc<DownloadService>,
    url: &str,
    owner: Option<&str>,
    download: &DownloadArgs,
) -> Result<()> {
    let id = run_prepare(service, url, owner).await?;
    run_start(service, &id, owner, download).await
}
