//! Output verification: which audio files appeared during one attempt.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::naming::is_audio_name;

/// Audio files in a directory keyed by path, with their modification time.
#[derive(Debug, Default)]
pub(crate) struct DirSnapshot {
    audio: HashMap<PathBuf, Option<SystemTime>>,
    all: Vec<String>,
}

impl DirSnapshot {
    /// Snapshot `dir` (non-recursive). A missing directory is empty.
    pub(crate) async fn take(dir: &Path) -> std::io::Result<Self> {
        let mut snap = Self::default();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(snap),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_audio_name(&name) {
                snap.audio.insert(entry.path(), meta.modified().ok());
            }
            snap.all.push(name);
        }
        snap.all.sort();
        Ok(snap)
    }

    /// Audio files that are new in `self` or were rewritten since `before`.
    pub(crate) fn new_since(&self, before: &DirSnapshot) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = self
            .audio
            .iter()
            .filter(|(path, mtime)| before.audio.get(*path) != Some(*mtime))
            .map(|(path, _)| path.clone())
            .collect();
        out.sort();
        out
    }

    /// Every regular file name, for diagnostics.
    pub(crate) fn file_names(&self) -> Vec<String> {
        self.all.clone()
    }
}
