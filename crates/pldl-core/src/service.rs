//! Operations exposed to callers: prepare, configure, start, cancel, delete.
//!
//! Admission limits and ownership checks live here, in front of the
//! orchestrator. Starting a download is fire-and-forget; callers poll the
//! task record for progress.

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::backend::ProcessBackend;
use crate::config::PldlConfig;
use crate::error::PldlError;
use crate::orchestrator::{DownloadOrchestrator, OrchestratorSettings};
use crate::task_db::{TaskDb, TaskId, TaskOptions, TaskRecord, TaskStatus, TaskSummary};

/// Per-owner admission limits.
#[derive(Debug, Clone, Copy)]
pub struct ServiceLimits {
    /// Pending/preparing/queued/ready tasks an owner may hold before
    /// `prepare` is refused.
    pub max_queued_per_owner: u64,
    /// Downloading/zipping tasks an owner may have before `start` is refused.
    pub max_running_per_owner: u64,
}

impl ServiceLimits {
    pub fn from_config(cfg: &PldlConfig) -> Self {
        Self {
            max_queued_per_owner: cfg.max_queued_tasks_per_owner,
            max_running_per_owner: cfg.max_running_tasks_per_owner,
        }
    }
}

/// Keeps a task id in the service's resolving set until dropped.
struct ResolvingGuard<'a> {
    resolving: &'a Mutex<HashSet<String>>,
    task_id: String,
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        let mut resolving = self.resolving.lock().unwrap_or_else(|e| e.into_inner());
        resolving.remove(&self.task_id);
    }
}

pub struct DownloadService {
    db: TaskDb,
    orchestrator: Arc<DownloadOrchestrator>,
    limits: ServiceLimits,
    resolving: Mutex<HashSet<String>>,
}

impl DownloadService {
    pub fn new(db: TaskDb, orchestrator: Arc<DownloadOrchestrator>, limits: ServiceLimits) -> Self {
        Self {
            db,
            orchestrator,
            limits,
            resolving: Mutex::new(HashSet::new()),
        }
    }

    /// Wire the process backend, orchestrator and limits from config.
    /// Cookie jars are materialized under the XDG state directory.
    pub async fn from_config(cfg: &PldlConfig, db: TaskDb) -> Result<Arc<Self>> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("pldl")?;
        let backend = ProcessBackend::from_config(cfg, &xdg_dirs.get_state_home()).await?;
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(db.clone()),
            Arc::new(backend),
            OrchestratorSettings::from_config(cfg)?,
        );
        Ok(Arc::new(Self::new(
            db,
            Arc::new(orchestrator),
            ServiceLimits::from_config(cfg),
        )))
    }

    pub fn db(&self) -> &TaskDb {
        &self.db
    }

    /// Mark tasks left mid-flight by a previous process as failed. Tasks
    /// this service is still resolving or downloading are not touched.
    ///
    /// Other processes sharing the database are invisible here, so this
    /// belongs at service start or behind an explicit operator command.
    pub async fn recover(&self) -> Result<u64> {
        let mut live = self.orchestrator.running_tasks();
        live.extend(
            self.resolving
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .cloned(),
        );
        let n = self.db.recover_interrupted_tasks(&live).await?;
        if n > 0 {
            tracing::warn!(count = n, "recovered interrupted tasks");
        }
        Ok(n)
    }

    async fn load(&self, task_id: &str) -> Result<TaskRecord, PldlError> {
        self.db
            .get_task(task_id)
            .await?
            .ok_or_else(|| PldlError::NotFound(task_id.to_string()))
    }

    /// Load a task the caller is allowed to act on. Unowned tasks are open
    /// to everyone.
    async fn load_owned(&self, task_id: &str, owner: Option<&str>) -> Result<TaskRecord, PldlError> {
        let task = self.load(task_id).await?;
        if let Some(task_owner) = task.owner.as_deref() {
            if owner != Some(task_owner) {
                return Err(PldlError::Ownership {
                    task_id: task_id.to_string(),
                });
            }
        }
        Ok(task)
    }

    /// Insert a `pending` task if the owner is under the queued limit.
    /// Downloads already in progress do not count against it.
    pub async fn create_task(&self, url: &str, owner: Option<&str>) -> Result<TaskId, PldlError> {
        let waiting = self
            .db
            .count_tasks_for_owner(owner, &TaskStatus::WAITING)
            .await?;
        if waiting >= self.limits.max_queued_per_owner {
            return Err(PldlError::CapacityExceeded(format!(
                "{} queued tasks (limit {})",
                waiting, self.limits.max_queued_per_owner
            )));
        }
        let id = self.db.create_task(url, owner).await?;
        tracing::info!(task_id = %id, url, "task created");
        Ok(id)
    }

    /// Resolve the playlist and move the task to `ready`.
    ///
    /// Tracks without a title, artist or URL are dropped. A playlist with
    /// nothing playable left fails the task.
    pub async fn resolve_playlist(&self, task_id: &str) -> Result<TaskRecord, PldlError> {
        self.resolving
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task_id.to_string());
        let _resolving = ResolvingGuard {
            resolving: &self.resolving,
            task_id: task_id.to_string(),
        };
        let mut task = self.load(task_id).await?;
        task.transition(TaskStatus::Preparing, "Fetching playlist info...")?;
        self.db.save_task_state(&task).await?;

        let mut playlist = match self.orchestrator.backend().fetch_metadata(&task.url).await {
            Ok(p) => p,
            Err(e) => {
                task.fail(&format!("Failed to fetch playlist: {}", e));
                self.db.save_task_state(&task).await?;
                tracing::warn!(task_id, "metadata resolution failed: {}", e);
                return Err(PldlError::MetadataResolution(e.to_string()));
            }
        };

        let listed = playlist.tracks.len();
        playlist.tracks.retain(|t| {
            !t.title.trim().is_empty() && !t.artist.trim().is_empty() && !t.url.trim().is_empty()
        });
        let skipped = listed - playlist.tracks.len();
        if playlist.tracks.is_empty() {
            let msg = "No playable tracks found in playlist";
            task.fail(msg);
            self.db.save_task_state(&task).await?;
            return Err(PldlError::MetadataResolution(msg.to_string()));
        }

        if self.db.is_cancel_requested(task_id).await? {
            task.transition(TaskStatus::Cancelled, "Cancelled")?;
            self.db.save_task_state(&task).await?;
            return Ok(task);
        }

        tracing::info!(
            task_id,
            title = %playlist.title,
            tracks = playlist.tracks.len(),
            skipped,
            "playlist resolved"
        );
        task.playlist = Some(playlist);
        let msg = if skipped > 0 {
            format!("Ready to download (skipped {} tracks)", skipped)
        } else {
            "Ready to download".to_string()
        };
        task.transition(TaskStatus::Ready, &msg)?;
        self.db.save_task_state(&task).await?;
        Ok(task)
    }

    /// Create a task and resolve its playlist in the background.
    pub async fn prepare_task(
        self: &Arc<Self>,
        url: &str,
        owner: Option<&str>,
    ) -> Result<TaskId, PldlError> {
        let id = self.create_task(url, owner).await?;
        let this = Arc::clone(self);
        let task_id = id.clone();
        tokio::spawn(async move {
            // Failures are recorded on the task.
            let _ = this.resolve_playlist(&task_id).await;
        });
        Ok(id)
    }

    /// Replace the user options of a task that has not started yet.
    pub async fn configure(
        &self,
        task_id: &str,
        owner: Option<&str>,
        options: TaskOptions,
    ) -> Result<(), PldlError> {
        let mut task = self.load_owned(task_id, owner).await?;
        if !matches!(
            task.status,
            TaskStatus::Pending | TaskStatus::Preparing | TaskStatus::Ready
        ) {
            return Err(PldlError::InvalidTransition {
                from: task.status,
                to: TaskStatus::Downloading,
            });
        }
        task.options = options;
        self.db.save_task_state(&task).await?;
        Ok(())
    }

    async fn admit_run(&self, task_id: &str, owner: Option<&str>) -> Result<TaskRecord, PldlError> {
        let task = self.load_owned(task_id, owner).await?;
        let running = self
            .db
            .count_tasks_for_owner(task.owner.as_deref(), &TaskStatus::RUNNING)
            .await?;
        if running >= self.limits.max_running_per_owner {
            return Err(PldlError::CapacityExceeded(format!(
                "{} downloads already running (limit {})",
                running, self.limits.max_running_per_owner
            )));
        }
        Ok(task)
    }

    /// Run the download to completion in the caller's task.
    pub async fn run_download(
        &self,
        task_id: &str,
        owner: Option<&str>,
    ) -> Result<TaskStatus, PldlError> {
        self.admit_run(task_id, owner).await?;
        self.orchestrator.run(task_id).await
    }

    /// Start the download in the background. The handle can be awaited or
    /// dropped; progress is in the task record either way.
    pub async fn start_download(
        self: &Arc<Self>,
        task_id: &str,
        owner: Option<&str>,
    ) -> Result<JoinHandle<Result<TaskStatus, PldlError>>, PldlError> {
        self.admit_run(task_id, owner).await?;
        let orchestrator = Arc::clone(&self.orchestrator);
        let task_id = task_id.to_string();
        Ok(tokio::spawn(async move { orchestrator.run(&task_id).await }))
    }

    /// Ask a run to stop. Tasks that have not started are cancelled at once.
    pub async fn request_cancel(&self, task_id: &str, owner: Option<&str>) -> Result<(), PldlError> {
        let mut task = self.load_owned(task_id, owner).await?;
        if task.status.is_terminal() {
            return Ok(());
        }
        self.db.request_cancel(task_id).await?;
        if task.status == TaskStatus::Ready {
            task.transition(TaskStatus::Cancelled, "Cancelled")?;
            self.db.save_task_state(&task).await?;
        }
        tracing::info!(task_id, status = %task.status, "cancellation requested");
        Ok(())
    }

    /// Delete a task row, and its artifact when `delete_files` is set.
    pub async fn delete_task(
        &self,
        task_id: &str,
        owner: Option<&str>,
        delete_files: bool,
    ) -> Result<(), PldlError> {
        let task = self.load_owned(task_id, owner).await?;
        if !task.status.is_terminal() {
            self.db.request_cancel(task_id).await?;
        }
        if delete_files {
            if let Some(path) = task.artifact_path.as_deref() {
                match tokio::fs::remove_file(Path::new(path)).await {
                    Ok(()) => tracing::info!(task_id, path, "artifact deleted"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(anyhow::Error::from(e).context("delete artifact").into()),
                }
            }
        }
        self.db.delete_task(task_id).await?;
        Ok(())
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskRecord, PldlError> {
        self.load(task_id).await
    }

    pub async fn list(&self, owner: Option<&str>, limit: u32) -> Result<Vec<TaskSummary>, PldlError> {
        Ok(self.db.list_tasks(owner, limit).await?)
    }

    pub async fn history(
        &self,
        owner: Option<&str>,
        limit: u32,
    ) -> Result<Vec<TaskSummary>, PldlError> {
        Ok(self.db.recent_completed(owner, limit).await?)
    }
}
