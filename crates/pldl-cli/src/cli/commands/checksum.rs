//! Checksum command: compute SHA-256 of a file.

use anyhow::Result;
use pldl_core::checksum;
use std::path::Path;

/// Compute and print SHA-256 of the given file.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let digest = checksum::sha256_artifact(path.to_path_buf()).await?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
