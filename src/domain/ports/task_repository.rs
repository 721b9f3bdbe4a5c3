//! Port for persisted Project and Task records (C7).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Project, Task, TaskStatus};

/// Persistence boundary for projects and their tasks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create_project(&self, project: &Project) -> DomainResult<()>;
    async fn get_project(&self, id: Uuid) -> DomainResult<Project>;

    async fn create_task(&self, task: &Task) -> DomainResult<()>;
    async fn get_task(&self, id: Uuid) -> DomainResult<Task>;
    async fn list_tasks(&self, project_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Compare-and-swap style status update: succeeds only if the task's
    /// current status matches `expected`.
    async fn update_task_status(&self, id: Uuid, expected: TaskStatus, next: TaskStatus) -> DomainResult<()>;
}
