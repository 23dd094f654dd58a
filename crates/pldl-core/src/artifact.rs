//! Final artifact assembly: one audio file or a zip of the work directory.
//!
//! Blocking I/O throughout; the orchestrator calls [`ArtifactAssembler::assemble`]
//! from `spawn_blocking`. Archives are written under a `.part` name and renamed
//! into place once complete.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PldlError;
use crate::naming::{is_audio_name, sanitize_filename};

const PART_SUFFIX: &str = ".part";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// A single audio file moved as-is.
    Single(PathBuf),
    /// Zip of the whole work directory.
    Archive(PathBuf),
}

impl Artifact {
    pub fn path(&self) -> &Path {
        match self {
            Artifact::Single(p) | Artifact::Archive(p) => p,
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Artifact::Archive(_))
    }
}

/// Moves finished work into the artifact store directory.
#[derive(Debug, Clone)]
pub struct ArtifactAssembler {
    store_dir: PathBuf,
}

impl ArtifactAssembler {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Turn `work_dir` into an artifact.
    ///
    /// One selected track with exactly one audio file is moved directly
    /// (prefixed with the task id if the name is taken). Anything else is
    /// archived. A work directory without audio is `NoArtifactProduced`.
    pub fn assemble(
        &self,
        task_id: &str,
        title: &str,
        work_dir: &Path,
        selected: usize,
    ) -> Result<Artifact, PldlError> {
        let audio = list_audio_files(work_dir)?;
        if audio.is_empty() {
            return Err(PldlError::NoArtifactProduced(format!(
                "no audio files in {}",
                work_dir.display()
            )));
        }
        fs::create_dir_all(&self.store_dir)
            .with_context(|| format!("create {}", self.store_dir.display()))?;

        if selected == 1 && audio.len() == 1 {
            let source = &audio[0];
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "track".to_string());
            let target = free_target(&self.store_dir, task_id, &name);
            move_file(source, &target)?;
            tracing::info!(task_id, path = %target.display(), "single-file artifact ready");
            return Ok(Artifact::Single(target));
        }

        let name = format!("{}_{}.zip", sanitize_filename(title), task_id);
        let target = self.store_dir.join(&name);
        let entries = write_via_part(&target, |part| write_zip(work_dir, part))?;
        tracing::info!(task_id, entries, path = %target.display(), "archive artifact ready");
        Ok(Artifact::Archive(target))
    }
}

/// Audio files directly inside `dir`, sorted by name.
pub fn list_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_audio_name(&entry.file_name().to_string_lossy()) {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

/// First of `name`, `{task_id}_{name}`, `{task_id}_{n}_{name}` (n = 2, 3, ...)
/// that does not exist in `dir`.
fn free_target(dir: &Path, task_id: &str, name: &str) -> PathBuf {
    let plain = dir.join(name);
    if !plain.exists() {
        return plain;
    }
    let prefixed = dir.join(format!("{}_{}", task_id, name));
    if !prefixed.exists() {
        return prefixed;
    }
    (2u32..)
        .map(|n| dir.join(format!("{}_{}_{}", task_id, n, name)))
        .find(|p| !p.exists())
        .unwrap_or(prefixed)
}

/// Write `target` through a `.part` sibling renamed into place on success.
/// The partial file is removed when writing or renaming fails.
fn write_via_part<T>(target: &Path, write: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    let mut part = target.as_os_str().to_owned();
    part.push(PART_SUFFIX);
    let part = PathBuf::from(part);
    let result = write(&part).and_then(|value| {
        fs::rename(&part, target)
            .with_context(|| format!("rename {} -> {}", part.display(), target.display()))?;
        Ok(value)
    });
    if result.is_err() {
        if let Err(e) = fs::remove_file(&part) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %part.display(), "failed to remove partial archive: {}", e);
            }
        }
    }
    result
}

/// Rename, or copy and remove when source and target are on different filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("remove {}", from.display()))?;
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let kind = entry.file_type()?;
        if kind.is_dir() {
            collect_files(root, &path, out)?;
        } else if kind.is_file() {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push((name, path));
        }
    }
    Ok(())
}

/// Deflate every regular file under `dir` into `target`. Returns the entry count.
fn write_zip(dir: &Path, target: &Path) -> Result<usize> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort();

    let out = File::create(target).with_context(|| format!("create {}", target.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, path) in &files {
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("add {} to archive", name))?;
        let mut src = File::open(path).with_context(|| format!("open {}", path.display()))?;
        io::copy(&mut src, &mut zip).with_context(|| format!("compress {}", path.display()))?;
    }
    zip.finish().context("finish archive")?;
    Ok(files.len())
}
