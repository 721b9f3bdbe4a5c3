//! SQLite-backed [`TaskRepository`].

use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentRole, Project, Task, TaskStatus};
use crate::domain::ports::task_repository::TaskRepository;

/// [`TaskRepository`] backed by a `sqlx` SQLite pool.
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_dependencies(&self, task_id: Uuid) -> DomainResult<HashSet<Uuid>> {
        let rows = sqlx::query("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?")
            .bind(task_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let raw: String = row.get(0);
                Uuid::from_str(&raw).map_err(|e| DomainError::Serialization(e.to_string()))
            })
            .collect()
    }

    fn row_to_task_fields(row: &sqlx::sqlite::SqliteRow) -> DomainResult<(Uuid, Uuid, String, String, Vec<String>, AgentRole, u8, TaskStatus, DateTime<Utc>, DateTime<Utc>)> {
        let id: String = row.get("id");
        let project_id: String = row.get("project_id");
        let title: String = row.get("title");
        let description: String = row.get("description");
        let acceptance_criteria: String = row.get("acceptance_criteria");
        let agent_role: String = row.get("agent_role");
        let priority: i64 = row.get("priority");
        let status: String = row.get("status");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok((
            Uuid::from_str(&id).map_err(|e| DomainError::Serialization(e.to_string()))?,
            Uuid::from_str(&project_id).map_err(|e| DomainError::Serialization(e.to_string()))?,
            title,
            description,
            serde_json::from_str(&acceptance_criteria)?,
            AgentRole::from_str(&agent_role)?,
            priority as u8,
            TaskStatus::from_str(&status)?,
            DateTime::parse_from_rfc3339(&created_at).map_err(|e| DomainError::Serialization(e.to_string()))?.with_timezone(&Utc),
            DateTime::parse_from_rfc3339(&updated_at).map_err(|e| DomainError::Serialization(e.to_string()))?.with_timezone(&Utc),
        ))
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create_project(&self, project: &Project) -> DomainResult<()> {
        let config = serde_json::to_string(&project.config)?;
        sqlx::query("INSERT INTO projects (id, name, description, repo_path, owner_id, config, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
            .bind(project.id.to_string())
            .bind(&project.name)
            .bind(&project.description)
            .bind(&project.repo_path)
            .bind(project.owner_id.to_string())
            .bind(config)
            .bind(project.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> DomainResult<Project> {
        let row = sqlx::query("SELECT id, name, description, repo_path, owner_id, config, created_at FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DomainError::ProjectNotFound(id))?;

        let owner_id: String = row.get("owner_id");
        let config: String = row.get("config");
        let created_at: String = row.get("created_at");
        Ok(Project {
            id,
            name: row.get("name"),
            description: row.get("description"),
            repo_path: row.get("repo_path"),
            owner_id: Uuid::from_str(&owner_id).map_err(|e| DomainError::Serialization(e.to_string()))?,
            config: serde_json::from_str(&config)?,
            created_at: DateTime::parse_from_rfc3339(&created_at).map_err(|e| DomainError::Serialization(e.to_string()))?.with_timezone(&Utc),
        })
    }

    async fn create_task(&self, task: &Task) -> DomainResult<()> {
        let acceptance_criteria = serde_json::to_string(&task.acceptance_criteria)?;
        sqlx::query(
            "INSERT INTO tasks (id, project_id, title, description, acceptance_criteria, agent_role, priority, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(task.project_id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(acceptance_criteria)
        .bind(task.agent_role.as_str())
        .bind(i64::from(task.priority))
        .bind(task.status.as_str())
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        for dep in &task.dependencies {
            sqlx::query("INSERT INTO task_dependencies (task_id, depends_on_id) VALUES (?, ?)")
                .bind(task.id.to_string())
                .bind(dep.to_string())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> DomainResult<Task> {
        let row = sqlx::query(
            "SELECT id, project_id, title, description, acceptance_criteria, agent_role, priority, status, created_at, updated_at
             FROM tasks WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DomainError::TaskNotFound(id))?;

        let (id, project_id, title, description, acceptance_criteria, agent_role, priority, status, created_at, updated_at) =
            Self::row_to_task_fields(&row)?;
        let dependencies = self.load_dependencies(id).await?;

        Ok(Task {
            id,
            project_id,
            title,
            description,
            acceptance_criteria,
            agent_role,
            priority,
            status,
            dependencies,
            created_at,
            updated_at,
        })
    }

    async fn list_tasks(&self, project_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT id, project_id, title, description, acceptance_criteria, agent_role, priority, status, created_at, updated_at
             FROM tasks WHERE project_id = ? ORDER BY created_at",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            let (id, project_id, title, description, acceptance_criteria, agent_role, priority, status, created_at, updated_at) =
                Self::row_to_task_fields(row)?;
            let dependencies = self.load_dependencies(id).await?;
            tasks.push(Task {
                id,
                project_id,
                title,
                description,
                acceptance_criteria,
                agent_role,
                priority,
                status,
                dependencies,
                created_at,
                updated_at,
            });
        }
        Ok(tasks)
    }

    async fn update_task_status(&self, id: Uuid, expected: TaskStatus, next: TaskStatus) -> DomainResult<()> {
        let result = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(next.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::IllegalTransition {
                from: expected.to_string(),
                to: next.to_string(),
            });
        }
        Ok(())
    }
}
