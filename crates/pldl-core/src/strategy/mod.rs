//! Per-track fetch paths.
//!
//! A [`TrackStrategy`] is chosen once per task from the playlist provider.
//! Every variant runs the same client-rotation loop around a single attempt;
//! they differ in what they ask the backend for and what happens when the
//! first path comes back empty.

mod output;

use std::path::{Path, PathBuf};

use crate::backend::{ClientIdentity, DownloadBackend, DownloadJob, FetchRequest, IdentityPool};
use crate::naming::{escape_output_template, render_track_name, sanitize_filename};
use crate::provider::Provider;
use crate::retry::{
    classify, classify_tool, run_with_rotation, BackendError, ErrorKind, RotationListener,
    RotationOutcome, RotationPolicy,
};
use crate::scheduler::CancellationGate;
use crate::task_db::{TaskOptions, Track};

use output::DirSnapshot;

/// Output template used by spotdl (its own placeholder syntax).
const TOOL_OUTPUT_TEMPLATE: &str = "{artists} - {title}.{output-ext}";

/// Everything one track download needs besides the track itself.
pub struct TrackContext<'a> {
    pub backend: &'a dyn DownloadBackend,
    pub identities: &'a IdentityPool,
    pub policy: &'a RotationPolicy,
    pub gate: &'a CancellationGate,
    /// Told about every identity switch, including those of a fallback path.
    pub listener: &'a dyn RotationListener,
    /// Private to this track; created on the first attempt.
    pub staging_dir: &'a Path,
    pub options: &'a TaskOptions,
    /// Tracks selected in this run.
    pub total: usize,
}

/// Final state of one track after rotation (and fallback, if any).
#[derive(Debug)]
pub enum TrackOutcome {
    /// New audio files, all inside the staging directory.
    Completed(Vec<PathBuf>),
    Failed { message: String, kind: ErrorKind },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStrategy {
    /// Generic extractor on the track's own URL.
    NativeExtractor,
    /// Metadata-driven external tool, falling back to a search when it
    /// yields no audio.
    ToolBacked,
    /// Free-text search for `"{artist} - {title} audio"`.
    SearchFallback,
}

impl TrackStrategy {
    pub fn select(provider: Provider, use_spotdl: bool) -> Self {
        match provider {
            Provider::Spotify if use_spotdl => TrackStrategy::ToolBacked,
            Provider::Spotify => TrackStrategy::SearchFallback,
            _ => TrackStrategy::NativeExtractor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackStrategy::NativeExtractor => "native",
            TrackStrategy::ToolBacked => "tool",
            TrackStrategy::SearchFallback => "search",
        }
    }

    fn classifier(self) -> fn(&BackendError) -> ErrorKind {
        match self {
            TrackStrategy::ToolBacked => classify_tool,
            _ => classify,
        }
    }

    fn job(self, ctx: &TrackContext<'_>, track: &Track) -> DownloadJob {
        let index = track.download_index.unwrap_or(1);
        let (request, output_template) = match self {
            TrackStrategy::NativeExtractor => {
                let name = render_track_name(&ctx.options.filename_template, track, ctx.total);
                let id_suffix = if ctx.total > 1 { "_%(id)s" } else { "" };
                (
                    FetchRequest::Direct {
                        url: track.url.clone(),
                    },
                    format!("{}{}.%(ext)s", escape_output_template(&name), id_suffix),
                )
            }
            TrackStrategy::SearchFallback => (
                FetchRequest::Search {
                    query: format!("{} - {} audio", track.artist, track.title),
                },
                format!(
                    "{:03} - {}.%(ext)s",
                    index,
                    escape_output_template(&sanitize_filename(&track.title))
                ),
            ),
            TrackStrategy::ToolBacked => (
                FetchRequest::Tool {
                    url: track.url.clone(),
                },
                TOOL_OUTPUT_TEMPLATE.to_string(),
            ),
        };
        DownloadJob {
            request,
            output_dir: ctx.staging_dir.to_path_buf(),
            output_template,
            format: ctx.options.format.clone(),
        }
    }

    /// One backend call with one identity. Succeeds only if new audio
    /// appeared in the staging directory.
    pub async fn attempt(
        self,
        ctx: &TrackContext<'_>,
        track: &Track,
        identity: &ClientIdentity,
    ) -> Result<Vec<PathBuf>, BackendError> {
        tokio::fs::create_dir_all(ctx.staging_dir).await?;
        let before = DirSnapshot::take(ctx.staging_dir).await?;
        ctx.backend.download(&self.job(ctx, track), identity).await?;
        let after = DirSnapshot::take(ctx.staging_dir).await?;
        let produced = after.new_since(&before);
        if produced.is_empty() {
            return Err(BackendError::NoOutput {
                produced: after.file_names(),
            });
        }
        Ok(produced)
    }

    async fn rotate(self, ctx: &TrackContext<'_>, track: &Track) -> RotationOutcome<Vec<PathBuf>> {
        run_with_rotation(ctx.policy, ctx.gate, self.classifier(), ctx.listener, |_, client| {
            let identity = ctx.identities.identity(client);
            async move { self.attempt(ctx, track, &identity).await }
        })
        .await
    }

    /// Download one track: rotate identities, fall back where this strategy
    /// has a fallback, and report the final outcome.
    pub async fn run(self, ctx: &TrackContext<'_>, track: &Track) -> TrackOutcome {
        let outcome = match (self, self.rotate(ctx, track).await) {
            (TrackStrategy::ToolBacked, RotationOutcome::Success(files)) => {
                return match rename_tool_output(track, files).await {
                    Ok(files) => TrackOutcome::Completed(files),
                    Err(e) => TrackOutcome::Failed {
                        message: format!("failed to rename tool output: {}", e),
                        kind: ErrorKind::Other,
                    },
                };
            }
            (TrackStrategy::ToolBacked, RotationOutcome::Exhausted(e))
            | (
                TrackStrategy::ToolBacked,
                RotationOutcome::Fatal(e @ BackendError::NoOutput { .. }),
            ) => {
                tracing::warn!(title = %track.title, "tool path produced no audio, searching instead: {}", e);
                TrackStrategy::SearchFallback.rotate(ctx, track).await
            }
            (_, other) => other,
        };

        match outcome {
            RotationOutcome::Success(files) => TrackOutcome::Completed(files),
            RotationOutcome::Cancelled => TrackOutcome::Cancelled,
            RotationOutcome::Fatal(e) => TrackOutcome::Failed {
                kind: classify(&e),
                message: e.to_string(),
            },
            RotationOutcome::Exhausted(e) => TrackOutcome::Failed {
                kind: classify(&e),
                message: format!("all client identities failed; last error: {}", e),
            },
        }
    }
}

/// Give a single tool-produced file the same `NNN - Title.ext` name the
/// search path uses.
async fn rename_tool_output(track: &Track, files: Vec<PathBuf>) -> std::io::Result<Vec<PathBuf>> {
    let [file] = files.as_slice() else {
        return Ok(files);
    };
    let (Some(dir), Some(ext)) = (file.parent(), file.extension()) else {
        return Ok(files);
    };
    let target = dir.join(format!(
        "{:03} - {}.{}",
        track.download_index.unwrap_or(1),
        sanitize_filename(&track.title),
        ext.to_string_lossy()
    ));
    if &target != file {
        tokio::fs::rename(file, &target).await?;
    }
    Ok(vec![target])
}

#[cfg(test)]
mod tests;
