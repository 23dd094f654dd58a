//! One track worker: capacity slot, strategy run, status bookkeeping.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::backend::{DownloadBackend, IdentityPool};
use crate::error::{truncate_message, MAX_MESSAGE_CHARS};
use crate::retry::{BackendError, ErrorKind, RotationListener, RotationPolicy};
use crate::scheduler::{CancellationGate, CapacityLimiter, ProgressAggregator};
use crate::strategy::{TrackContext, TrackOutcome, TrackStrategy};
use crate::task_db::{TaskOptions, TaskRecord, TaskStore, TrackStatus};

/// Per-track staging directories live under this name inside the work dir.
pub(super) const STAGING_DIR: &str = ".staging";

/// Shown instead of the raw tool output when a track finally fails on a
/// bot-check or rate limit.
pub(super) const SERVICE_BUSY_MESSAGE: &str =
    "Service busy: the provider is limiting requests from this server. Please try again in 10-15 minutes.";

/// Working copy of the task plus the aggregator that decides when to save it.
pub(super) struct RunState {
    pub task: TaskRecord,
    pub selected: Vec<usize>,
    pub progress: ProgressAggregator,
}

impl RunState {
    /// Recompute progress and persist when the aggregator says so.
    pub async fn report(&mut self, store: &dyn TaskStore, force: bool) -> Result<()> {
        if self.progress.update(&mut self.task, &self.selected, force) {
            store.save_task_state(&self.task).await?;
        }
        Ok(())
    }

    pub fn completed_count(&self) -> usize {
        let tracks = self.task.tracks();
        self.selected
            .iter()
            .filter_map(|&i| tracks.get(i))
            .filter(|t| t.status == TrackStatus::Completed)
            .count()
    }
}

/// Shared by every worker of one run.
pub(super) struct RunContext {
    pub task_id: String,
    pub store: Arc<dyn TaskStore>,
    pub backend: Arc<dyn DownloadBackend>,
    pub capacity: Arc<CapacityLimiter>,
    pub identities: IdentityPool,
    pub policy: RotationPolicy,
    pub gate: CancellationGate,
    pub strategy: TrackStrategy,
    pub options: TaskOptions,
    pub work_dir: PathBuf,
    pub total: usize,
    pub throttle_backoff: Duration,
    pub state: Mutex<RunState>,
}

impl RunContext {
    async fn set_track(
        &self,
        index: usize,
        status: TrackStatus,
        error: Option<String>,
        force: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(track) = state.task.track_mut(index) {
            track.status = status;
            track.error = error.map(|e| truncate_message(&e));
        }
        state.report(self.store.as_ref(), force).await
    }
}

/// Records the transient cause on the track while rotation backs off.
struct RotationReporter<'a> {
    ctx: &'a RunContext,
    index: usize,
}

#[async_trait]
impl RotationListener for RotationReporter<'_> {
    async fn rotating(&self, next_client: Option<&str>, kind: ErrorKind, _cause: &BackendError) {
        let cause = match kind {
            ErrorKind::BotCheck => "Bot check",
            ErrorKind::RateLimited => "Rate limited",
            _ => "Download failed",
        };
        let msg = format!(
            "{}. Rotating client... (trying {})",
            cause,
            next_client.unwrap_or("default")
        );
        if let Err(e) = self
            .ctx
            .set_track(self.index, TrackStatus::Downloading, Some(msg), true)
            .await
        {
            tracing::warn!(task_id = %self.ctx.task_id, index = self.index, "failed to record rotation: {:#}", e);
        }
    }
}

/// User-facing error for a track that failed for good. Throttling gets the
/// busy notice up front; the tail of the underlying cause follows in
/// parentheses within the message length limit.
pub(super) fn failure_message(message: String, kind: ErrorKind) -> String {
    if !kind.is_throttle() {
        return message;
    }
    let room = MAX_MESSAGE_CHARS.saturating_sub(SERVICE_BUSY_MESSAGE.chars().count() + 3);
    let cause = message.trim();
    let count = cause.chars().count();
    let tail: String = cause.chars().skip(count.saturating_sub(room)).collect();
    format!("{} ({})", SERVICE_BUSY_MESSAGE, tail)
}

/// Move verified files out of staging into the shared work directory.
async fn collect_output(files: Vec<PathBuf>, work_dir: &Path, index: u32) -> std::io::Result<()> {
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let mut target = work_dir.join(name);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            target = work_dir.join(format!("{:03}_{}", index, name.to_string_lossy()));
        }
        tokio::fs::rename(&file, &target).await?;
    }
    Ok(())
}

pub(super) async fn download_track(ctx: Arc<RunContext>, index: usize) -> Result<()> {
    let _permit = ctx.capacity.acquire().await?;

    if ctx.gate.should_cancel().await {
        return ctx.set_track(index, TrackStatus::Cancelled, None, false).await;
    }

    let track = {
        let state = ctx.state.lock().await;
        let Some(track) = state.task.tracks().get(index) else {
            return Ok(());
        };
        track.clone()
    };
    ctx.set_track(index, TrackStatus::Downloading, None, true).await?;
    let download_index = track.download_index.unwrap_or(index as u32 + 1);
    let staging = ctx
        .work_dir
        .join(STAGING_DIR)
        .join(format!("{:03}", download_index));

    let reporter = RotationReporter {
        ctx: ctx.as_ref(),
        index,
    };
    let track_ctx = TrackContext {
        backend: ctx.backend.as_ref(),
        identities: &ctx.identities,
        policy: &ctx.policy,
        gate: &ctx.gate,
        listener: &reporter,
        staging_dir: &staging,
        options: &ctx.options,
        total: ctx.total,
    };
    tracing::debug!(task_id = %ctx.task_id, index, title = %track.title, strategy = ctx.strategy.as_str(), "track started");

    match ctx.strategy.run(&track_ctx, &track).await {
        TrackOutcome::Completed(files) => {
            match collect_output(files, &ctx.work_dir, download_index).await {
                Ok(()) => {
                    tracing::info!(task_id = %ctx.task_id, index, title = %track.title, "track completed");
                    ctx.set_track(index, TrackStatus::Completed, None, false).await?;
                }
                Err(e) => {
                    let msg = format!("failed to collect output: {}", e);
                    ctx.set_track(index, TrackStatus::Error, Some(msg), false).await?;
                }
            }
        }
        TrackOutcome::Failed { message, kind } => {
            tracing::warn!(task_id = %ctx.task_id, index, title = %track.title, ?kind, "track failed: {}", message);
            let shown = failure_message(message, kind);
            ctx.set_track(index, TrackStatus::Error, Some(shown), false).await?;
            if kind.is_throttle() && !ctx.throttle_backoff.is_zero() {
                tracing::warn!(
                    task_id = %ctx.task_id,
                    backoff = ?ctx.throttle_backoff,
                    "provider is throttling; holding capacity slot before releasing"
                );
                tokio::time::sleep(ctx.throttle_backoff).await;
            }
        }
        TrackOutcome::Cancelled => {
            ctx.set_track(index, TrackStatus::Cancelled, None, false).await?;
        }
    }
    Ok(())
}
