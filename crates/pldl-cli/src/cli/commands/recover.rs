//! `pldl recover` – fail tasks left mid-run by a previous process.

use anyhow::Result;
use pldl_core::service::DownloadService;

pub async fn run_recover(service: &DownloadService) -> Result<()> {
    let n = service.recover().await?;
    println!("Recovered {n} interrupted task(s)");
    Ok(())
}
