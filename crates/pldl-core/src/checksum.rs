//! SHA-256 of finished artifacts.
//!
//! Computed after the task is marked completed, never while tracks are
//! downloading.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Lowercase hex SHA-256 of a file, streamed.
pub fn sha256_path(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(64 * 1024, f);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).with_context(|| format!("read {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// [`sha256_path`] on the blocking pool.
pub async fn sha256_artifact(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || sha256_path(&path))
        .await
        .context("checksum task")?
}
