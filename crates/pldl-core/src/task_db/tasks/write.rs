//! Task write operations: create, full-state save, cancel flag, delete, recovery.

use anyhow::Result;

use super::super::db::{unix_timestamp, TaskDb};
use super::super::record::TaskRecord;
use super::super::types::TaskId;

/// Message left on tasks that were mid-flight when the process died.
pub const INTERRUPTED_MESSAGE: &str = "Interrupted by restart";

impl TaskDb {
    /// Insert a new `pending` task and return its id.
    pub async fn create_task(&self, url: &str, owner: Option<&str>) -> Result<TaskId> {
        let id = uuid::Uuid::new_v4().to_string();
        let task = TaskRecord::new(id.clone(), url, owner);
        let options_json = serde_json::to_string(&task.options)?;

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, owner_id, status, progress, message, url,
                playlist_json, options_json, cancel_requested, artifact_path,
                created_at, updated_at, status_updated_at
            ) VALUES (?1, ?2, ?3, 0, ?4, ?5,
                      NULL, ?6, 0, NULL,
                      ?7, ?7, ?7)
            "#,
        )
        .bind(&task.id)
        .bind(&task.owner)
        .bind(task.status.as_str())
        .bind(&task.message)
        .bind(&task.url)
        .bind(options_json)
        .bind(task.created_at)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Write back a working copy. Never touches `cancel_requested`, so a
    /// concurrent cancellation request is not lost to a last-writer-wins save.
    pub async fn save_task_state(&self, task: &TaskRecord) -> Result<()> {
        let now = unix_timestamp();
        let playlist_json = task
            .playlist
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let options_json = serde_json::to_string(&task.options)?;

        sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?1,
                progress = ?2,
                message = ?3,
                playlist_json = ?4,
                options_json = ?5,
                artifact_path = ?6,
                updated_at = ?7,
                status_updated_at = ?8
            WHERE id = ?9
            "#,
        )
        .bind(task.status.as_str())
        .bind(task.progress)
        .bind(&task.message)
        .bind(playlist_json)
        .bind(options_json)
        .bind(&task.artifact_path)
        .bind(now)
        .bind(task.status_updated_at)
        .bind(&task.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Set the cancel flag. Returns false when the task does not exist.
    pub async fn request_cancel(&self, id: &str) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE tasks
            SET cancel_requested = 1,
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Permanently remove a task row. Artifact cleanup is handled by higher layers.
    pub async fn delete_task(&self, id: &str) -> Result<bool> {
        let r = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Mark tasks left mid-flight by a previous process as failed.
    /// Tasks in `live` are still being worked on by this process and are
    /// left alone. Returns the number of tasks updated.
    pub async fn recover_interrupted_tasks(&self, live: &[String]) -> Result<u64> {
        let now = unix_timestamp();
        let mut q = sqlx::QueryBuilder::<sqlx::Sqlite>::new("UPDATE tasks SET status = 'error', message = ");
        q.push_bind(INTERRUPTED_MESSAGE);
        q.push(", updated_at = ").push_bind(now);
        q.push(", status_updated_at = ").push_bind(now);
        q.push(" WHERE status IN ('preparing', 'queued', 'downloading', 'zipping')");
        if !live.is_empty() {
            q.push(" AND id NOT IN (");
            let mut ids = q.separated(", ");
            for id in live {
                ids.push_bind(id);
            }
            ids.push_unseparated(")");
        }
        let r = q.build().execute(&self.pool).await?;
        Ok(r.rows_affected())
    }
}
