//! Drives one task from `ready` to a finished artifact.
//!
//! A run takes the owner's slot (waiting in `queued` if another run of the
//! same owner holds it), fans tracks out to workers bounded by the shared
//! [`CapacityLimiter`], then assembles the artifact. The working copy of the
//! task is written back at checkpoints; the cancel flag is only ever read.

mod worker;

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;

use crate::artifact::ArtifactAssembler;
use crate::backend::{DownloadBackend, IdentityPool};
use crate::checksum::sha256_artifact;
use crate::config::PldlConfig;
use crate::error::PldlError;
use crate::retry::RotationPolicy;
use crate::scheduler::{CancellationGate, CapacityLimiter, OwnerScheduler, ProgressAggregator};
use crate::strategy::TrackStrategy;
use crate::task_db::{TaskRecord, TaskStatus, TaskStore};

use worker::{download_track, RunContext, RunState, STAGING_DIR};

/// How many failed tracks the all-fail message quotes.
const FAILURE_EXAMPLES: usize = 3;

/// Progress while the artifact is assembled.
const ZIPPING_PROGRESS: f64 = 90.0;
const MOVING_PROGRESS: f64 = 95.0;

/// Runtime knobs derived from [`PldlConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_concurrent_tracks: usize,
    pub artifact_dir: PathBuf,
    /// Per-run working directories are created under this.
    pub work_root: PathBuf,
    pub progress_save_interval: Duration,
    pub cancel_check_interval: Duration,
    pub throttle_backoff: Duration,
    pub rotation: RotationPolicy,
    pub identities: IdentityPool,
    pub use_spotdl: bool,
}

impl OrchestratorSettings {
    pub fn from_config(cfg: &PldlConfig) -> Result<Self> {
        Ok(Self {
            max_concurrent_tracks: cfg.max_concurrent_tracks,
            artifact_dir: cfg.artifact_dir()?,
            work_root: std::env::temp_dir().join("pldl"),
            progress_save_interval: Duration::from_millis(cfg.progress_save_interval_ms),
            cancel_check_interval: Duration::from_millis(cfg.cancel_check_interval_ms),
            throttle_backoff: Duration::from_secs(cfg.throttle_backoff_secs),
            rotation: RotationPolicy::from_config(&cfg.rotation),
            identities: IdentityPool::from_config(&cfg.ytdlp),
            use_spotdl: cfg.spotify.use_spotdl,
        })
    }
}

/// Removes a task id from the in-process running set on drop.
struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    task_id: String,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&self.task_id);
    }
}

pub struct DownloadOrchestrator {
    store: Arc<dyn TaskStore>,
    backend: Arc<dyn DownloadBackend>,
    owners: OwnerScheduler,
    capacity: Arc<CapacityLimiter>,
    artifacts: ArtifactAssembler,
    settings: OrchestratorSettings,
    running: Mutex<HashSet<String>>,
}

impl DownloadOrchestrator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        backend: Arc<dyn DownloadBackend>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            backend,
            owners: OwnerScheduler::new(),
            capacity: Arc::new(CapacityLimiter::new(settings.max_concurrent_tracks)),
            artifacts: ArtifactAssembler::new(settings.artifact_dir.clone()),
            settings,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn DownloadBackend> {
        &self.backend
    }

    pub fn capacity(&self) -> &CapacityLimiter {
        &self.capacity
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Ids of tasks with a run in progress in this process.
    pub fn running_tasks(&self) -> Vec<String> {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.iter().cloned().collect()
    }

    fn claim(&self, task_id: &str) -> Option<RunningGuard<'_>> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(task_id.to_string()) {
            return None;
        }
        Some(RunningGuard {
            running: &self.running,
            task_id: task_id.to_string(),
        })
    }

    async fn load(&self, task_id: &str) -> Result<TaskRecord, PldlError> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| PldlError::NotFound(task_id.to_string()))
    }

    async fn finish_cancelled(&self, task: &mut TaskRecord) -> Result<TaskStatus, PldlError> {
        task.transition(TaskStatus::Cancelled, "Cancelled")?;
        self.store.save_task_state(task).await?;
        tracing::info!(task_id = %task.id, "task cancelled");
        Ok(TaskStatus::Cancelled)
    }

    /// Run a `ready` (or `queued`) task to a terminal status.
    ///
    /// Track failures and cancellation are outcomes, not errors: they come
    /// back as `Ok(Error)` / `Ok(Cancelled)`. `Err` means the run itself
    /// broke; the task is marked `error` before returning it.
    pub async fn run(&self, task_id: &str) -> Result<TaskStatus, PldlError> {
        let _running = self
            .claim(task_id)
            .ok_or_else(|| PldlError::AlreadyRunning(task_id.to_string()))?;

        let mut task = self.load(task_id).await?;
        if !matches!(task.status, TaskStatus::Ready | TaskStatus::Queued) {
            return Err(PldlError::InvalidTransition {
                from: task.status,
                to: TaskStatus::Downloading,
            });
        }

        let gate = CancellationGate::new(
            Arc::clone(&self.store),
            task_id.to_string(),
            self.settings.cancel_check_interval,
        );
        if gate.should_cancel().await {
            return self.finish_cancelled(&mut task).await;
        }

        let _owner = match self.owners.try_acquire(task.owner.as_deref()) {
            Some(guard) => guard,
            None => {
                task.transition(TaskStatus::Queued, "Queued for download...")?;
                self.store.save_task_state(&task).await?;
                tracing::info!(task_id, "owner busy; task queued");
                self.owners.acquire(task.owner.as_deref()).await
            }
        };

        // State may have moved while we waited for the owner.
        let mut task = self.load(task_id).await?;
        if task.status.is_terminal() {
            return Ok(task.status);
        }
        if gate.should_cancel().await {
            return self.finish_cancelled(&mut task).await;
        }

        let work_dir = self.settings.work_root.join(task_id);
        let result = self.execute(task, gate, work_dir.clone()).await;
        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(task_id, "failed to remove work dir: {}", e);
            }
        }
        result
    }

    async fn execute(
        &self,
        mut task: TaskRecord,
        gate: CancellationGate,
        work_dir: PathBuf,
    ) -> Result<TaskStatus, PldlError> {
        task.transition(TaskStatus::Downloading, "Starting download...")?;
        let selected = task.selected_indices();
        if selected.is_empty() {
            task.fail("playlist has no tracks");
            self.store.save_task_state(&task).await?;
            return Err(PldlError::MetadataResolution(
                "playlist has no tracks".to_string(),
            ));
        }
        task.begin_run(&selected);
        self.store.save_task_state(&task).await?;

        let strategy = TrackStrategy::select(
            task.playlist.as_ref().map(|p| p.provider).unwrap_or_default(),
            self.settings.use_spotdl,
        );
        tracing::info!(
            task_id = %task.id,
            tracks = selected.len(),
            strategy = strategy.as_str(),
            "download started"
        );

        let ctx = Arc::new(RunContext {
            task_id: task.id.clone(),
            store: Arc::clone(&self.store),
            backend: Arc::clone(&self.backend),
            capacity: Arc::clone(&self.capacity),
            identities: self.settings.identities.clone(),
            policy: self.settings.rotation.clone(),
            gate,
            strategy,
            options: task.options.clone(),
            work_dir,
            total: selected.len(),
            throttle_backoff: self.settings.throttle_backoff,
            state: tokio::sync::Mutex::new(RunState {
                task,
                selected,
                progress: ProgressAggregator::new(self.settings.progress_save_interval),
            }),
        });

        match self.drive(&ctx).await {
            Ok(status) => Ok(status),
            Err(e) => {
                let mut state = ctx.state.lock().await;
                state.task.fail(&e.to_string());
                if let Err(save_err) = self.store.save_task_state(&state.task).await {
                    tracing::error!(task_id = %ctx.task_id, "failed to record task error: {:#}", save_err);
                }
                tracing::error!(task_id = %ctx.task_id, "download failed: {}", e);
                Err(e)
            }
        }
    }

    async fn drive(&self, ctx: &Arc<RunContext>) -> Result<TaskStatus, PldlError> {
        tokio::fs::create_dir_all(&ctx.work_dir)
            .await
            .map_err(|e| anyhow!("create {}: {}", ctx.work_dir.display(), e))?;

        let indices = {
            let mut state = ctx.state.lock().await;
            state.report(ctx.store.as_ref(), true).await?;
            state.selected.clone()
        };
        let mut workers = JoinSet::new();
        for index in indices {
            workers.spawn(download_track(Arc::clone(ctx), index));
        }
        while let Some(res) = workers.join_next().await {
            res.map_err(|e| anyhow!("track worker: {}", e))??;
        }

        let _ = tokio::fs::remove_dir_all(ctx.work_dir.join(STAGING_DIR)).await;

        let mut state = ctx.state.lock().await;
        state.report(ctx.store.as_ref(), true).await?;

        if ctx.gate.should_cancel().await {
            return self.finish_cancelled(&mut state.task).await;
        }

        if state.completed_count() == 0 {
            let examples = state.task.failure_examples(&state.selected, FAILURE_EXAMPLES);
            let mut msg = "no tracks were downloaded successfully".to_string();
            if !examples.is_empty() {
                msg.push_str(". Examples: ");
                msg.push_str(&examples.join(" | "));
            }
            state.task.transition(TaskStatus::Error, &msg)?;
            ctx.store.save_task_state(&state.task).await?;
            tracing::warn!(task_id = %ctx.task_id, "{}", msg);
            return Ok(TaskStatus::Error);
        }

        state.task.transition(TaskStatus::Zipping, "Finalizing...")?;
        state.task.raise_progress(ZIPPING_PROGRESS);
        if ctx.total == 1 {
            state.task.message = "Moving file...".to_string();
            state.task.raise_progress(MOVING_PROGRESS);
        }
        ctx.store.save_task_state(&state.task).await?;

        let artifacts = self.artifacts.clone();
        let task_id = ctx.task_id.clone();
        let title = state.task.title().unwrap_or("playlist").to_string();
        let work_dir = ctx.work_dir.clone();
        let total = ctx.total;
        let artifact = tokio::task::spawn_blocking(move || {
            artifacts.assemble(&task_id, &title, &work_dir, total)
        })
        .await
        .map_err(|e| anyhow!("artifact task: {}", e))??;

        state.task.artifact_path = Some(artifact.path().display().to_string());
        state.task.transition(TaskStatus::Completed, "Download Ready!")?;
        state.task.raise_progress(100.0);
        ctx.store.save_task_state(&state.task).await?;
        tracing::info!(
            task_id = %ctx.task_id,
            path = %artifact.path().display(),
            archive = artifact.is_archive(),
            "download completed"
        );

        match sha256_artifact(artifact.path().to_path_buf()).await {
            Ok(digest) => tracing::debug!(task_id = %ctx.task_id, sha256 = %digest, "artifact checksum"),
            Err(e) => tracing::warn!(task_id = %ctx.task_id, "artifact checksum failed: {:#}", e),
        }
        Ok(TaskStatus::Completed)
    }
}
