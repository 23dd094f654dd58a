//! Download capability: metadata resolution and per-track fetches.
//!
//! The orchestrator only depends on [`DownloadBackend`]. [`ProcessBackend`]
//! implements it on top of the yt-dlp and spotdl command-line tools.

mod args;
mod cookies;
#[cfg(test)]
pub(crate) mod fake;
mod identity;
mod metadata;
mod process;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::retry::BackendError;
use crate::task_db::Playlist;

pub use cookies::{fetch_cookie_jar, prepare_cookie_file};
pub use identity::{ClientIdentity, IdentityPool, FALLBACK_USER_AGENT};
pub use metadata::{parse_spotdl_save, parse_ytdlp_flat};
pub use process::ProcessBackend;

/// What one download call should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// Generic extractor on the track's own URL.
    Direct { url: String },
    /// Free-text search against the generic extractor (first hit).
    Search { query: String },
    /// Metadata-driven external tool on the track URL.
    Tool { url: String },
}

/// One download call: what to fetch and where output goes.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub request: FetchRequest,
    pub output_dir: PathBuf,
    /// Output name template understood by the backend for this request kind.
    pub output_template: String,
    /// Target audio format (e.g. "mp3").
    pub format: String,
}

#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Resolve a playlist URL into track descriptors.
    async fn fetch_metadata(&self, url: &str) -> Result<Playlist, BackendError>;

    /// Fetch one track into `job.output_dir` using the given identity.
    /// Success only means the call finished cleanly; callers verify output.
    async fn download(
        &self,
        job: &DownloadJob,
        identity: &ClientIdentity,
    ) -> Result<(), BackendError>;
}
