//! The task-store capability the orchestrator consumes.

use anyhow::Result;
use async_trait::async_trait;

use super::db::TaskDb;
use super::record::TaskRecord;
use super::types::{TaskId, TaskStatus};

/// Durable task records. The orchestrator reads the cancel flag but never
/// writes it; full-state saves are last-writer-wins for everything else.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, url: &str, owner: Option<&str>) -> Result<TaskId>;
    async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>>;
    async fn save_task_state(&self, task: &TaskRecord) -> Result<()>;
    async fn get_task_owner(&self, id: &str) -> Result<Option<String>>;
    async fn count_tasks_for_owner(
        &self,
        owner: Option<&str>,
        statuses: &[TaskStatus],
    ) -> Result<u64>;
    async fn is_cancel_requested(&self, id: &str) -> Result<bool>;
}

#[async_trait]
impl TaskStore for TaskDb {
    async fn create_task(&self, url: &str, owner: Option<&str>) -> Result<TaskId> {
        TaskDb::create_task(self, url, owner).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>> {
        TaskDb::get_task(self, id).await
    }

    async fn save_task_state(&self, task: &TaskRecord) -> Result<()> {
        TaskDb::save_task_state(self, task).await
    }

    async fn get_task_owner(&self, id: &str) -> Result<Option<String>> {
        TaskDb::get_task_owner(self, id).await
    }

    async fn count_tasks_for_owner(
        &self,
        owner: Option<&str>,
        statuses: &[TaskStatus],
    ) -> Result<u64> {
        TaskDb::count_tasks_for_owner(self, owner, statuses).await
    }

    async fn is_cancel_requested(&self, id: &str) -> Result<bool> {
        TaskDb::is_cancel_requested(self, id).await
    }
}
