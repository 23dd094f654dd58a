//! Task read operations: get, owner lookups, counts, listings.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::super::db::TaskDb;
use super::super::record::TaskRecord;
use super::super::types::{Playlist, TaskOptions, TaskStatus, TaskSummary};

fn record_from_row(row: &SqliteRow) -> Result<TaskRecord> {
    let playlist_json: Option<String> = row.get("playlist_json");
    let options_json: Option<String> = row.get("options_json");
    let status_str: String = row.get("status");

    let playlist = playlist_json
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(serde_json::from_str::<Playlist>)
        .transpose()?;
    let options = options_json
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(serde_json::from_str::<TaskOptions>)
        .transpose()?
        .unwrap_or_default();

    Ok(TaskRecord {
        id: row.get("id"),
        owner: row.get("owner_id"),
        status: TaskStatus::from_str(&status_str),
        progress: row.get("progress"),
        message: row.get("message"),
        url: row.get("url"),
        playlist,
        options,
        artifact_path: row.get("artifact_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        status_updated_at: row.get("status_updated_at"),
    })
}

fn summary_from_row(row: &SqliteRow) -> TaskSummary {
    let status_str: String = row.get("status");
    TaskSummary {
        id: row.get("id"),
        owner: row.get("owner_id"),
        status: TaskStatus::from_str(&status_str),
        progress: row.get("progress"),
        message: row.get("message"),
        title: row.get("title"),
        artifact_path: row.get("artifact_path"),
        created_at: row.get("created_at"),
    }
}

impl TaskDb {
    /// Fetch a full task row.
    pub async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, owner_id, status, progress, message, url,
                playlist_json, options_json, artifact_path,
                created_at, updated_at, status_updated_at
            FROM tasks
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Owner of a task; `None` when the task is missing or unowned.
    pub async fn get_task_owner(&self, id: &str) -> Result<Option<String>> {
        let owner: Option<Option<String>> =
            sqlx::query_scalar("SELECT owner_id FROM tasks WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(owner.flatten())
    }

    /// Authoritative cancel flag. A task that no longer exists reads as cancelled
    /// so a run whose row was deleted winds down.
    pub async fn is_cancel_requested(&self, id: &str) -> Result<bool> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT cancel_requested FROM tasks WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(flag.unwrap_or(true))
    }

    /// Count an owner's tasks in any of `statuses`. `None` counts unowned tasks.
    pub async fn count_tasks_for_owner(
        &self,
        owner: Option<&str>,
        statuses: &[TaskStatus],
    ) -> Result<u64> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let owner_clause = if owner.is_some() {
            "owner_id = ?"
        } else {
            "owner_id IS NULL"
        };
        let sql = format!(
            "SELECT COUNT(*) FROM tasks WHERE {owner_clause} AND status IN ({placeholders})"
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    /// List tasks newest first, optionally restricted to one owner.
    pub async fn list_tasks(&self, owner: Option<&str>, limit: u32) -> Result<Vec<TaskSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, status, progress, message, artifact_path, created_at,
                   json_extract(playlist_json, '$.title') AS title
            FROM tasks
            WHERE ?1 IS NULL OR owner_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(owner)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(summary_from_row).collect())
    }

    /// Completed tasks with an artifact, most recently finished first.
    pub async fn recent_completed(
        &self,
        owner: Option<&str>,
        limit: u32,
    ) -> Result<Vec<TaskSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, status, progress, message, artifact_path, created_at,
                   json_extract(playlist_json, '$.title') AS title
            FROM tasks
            WHERE status = 'completed'
              AND artifact_path IS NOT NULL
              AND (?1 IS NULL OR owner_id = ?1)
            ORDER BY status_updated_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(owner)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(summary_from_row).collect())
    }
}
