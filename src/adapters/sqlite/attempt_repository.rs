//! SQLite-backed [`AttemptRepository`].

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentRole, Attempt, AttemptEvent, AttemptStatus, EventKind, GateKind, GateResult, GateStatus};
use crate::domain::ports::attempt_repository::AttemptRepository;

/// [`AttemptRepository`] backed by a `sqlx` SQLite pool.
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_attempt(row: &sqlx::sqlite::SqliteRow) -> DomainResult<Attempt> {
        let id: String = row.get("id");
        let task_id: String = row.get("task_id");
        let agent_role: String = row.get("agent_role");
        let status: String = row.get("status");
        let files_changed: String = row.get("files_changed");
        let created_at: String = row.get("created_at");
        let started_at: Option<String> = row.get("started_at");
        let completed_at: Option<String> = row.get("completed_at");

        Ok(Attempt {
            id: Uuid::from_str(&id).map_err(|e| DomainError::Serialization(e.to_string()))?,
            task_id: Uuid::from_str(&task_id).map_err(|e| DomainError::Serialization(e.to_string()))?,
            agent_role: AgentRole::from_str(&agent_role)?,
            status: AttemptStatus::from_str(&status)?,
            git_branch: row.get("git_branch"),
            working_copy_path: row.get("working_copy_path"),
            result: row.get("result"),
            diff: row.get("diff"),
            error_message: row.get("error_message"),
            files_changed: serde_json::from_str(&files_changed)?,
            created_at: parse_ts(&created_at)?,
            started_at: started_at.map(|s| parse_ts(&s)).transpose()?,
            completed_at: completed_at.map(|s| parse_ts(&s)).transpose()?,
        })
    }
}

fn parse_ts(raw: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(|e| DomainError::Serialization(e.to_string()))
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn create_attempt(&self, attempt: &Attempt) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO attempts (id, task_id, agent_role, status, git_branch, working_copy_path, result, diff, error_message, files_changed, created_at, started_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(attempt.id.to_string())
        .bind(attempt.task_id.to_string())
        .bind(attempt.agent_role.as_str())
        .bind(attempt.status.as_str())
        .bind(&attempt.git_branch)
        .bind(&attempt.working_copy_path)
        .bind(&attempt.result)
        .bind(&attempt.diff)
        .bind(&attempt.error_message)
        .bind(serde_json::to_string(&attempt.files_changed)?)
        .bind(attempt.created_at.to_rfc3339())
        .bind(attempt.started_at.map(|t| t.to_rfc3339()))
        .bind(attempt.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_attempt(&self, id: Uuid) -> DomainResult<Attempt> {
        let row = sqlx::query(
            "SELECT id, task_id, agent_role, status, git_branch, working_copy_path, result, diff, error_message, files_changed, created_at, started_at, completed_at
             FROM attempts WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DomainError::AttemptNotFound(id))?;
        Self::row_to_attempt(&row)
    }

    async fn list_attempts_for_task(&self, task_id: Uuid) -> DomainResult<Vec<Attempt>> {
        let rows = sqlx::query(
            "SELECT id, task_id, agent_role, status, git_branch, working_copy_path, result, diff, error_message, files_changed, created_at, started_at, completed_at
             FROM attempts WHERE task_id = ? ORDER BY created_at DESC",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_attempt).collect()
    }

    async fn list_attempts_for_project(&self, project_id: Uuid, status: Option<AttemptStatus>) -> DomainResult<Vec<Attempt>> {
        let rows = sqlx::query(
            "SELECT a.id, a.task_id, a.agent_role, a.status, a.git_branch, a.working_copy_path, a.result, a.diff, a.error_message, a.files_changed, a.created_at, a.started_at, a.completed_at
             FROM attempts a JOIN tasks t ON t.id = a.task_id
             WHERE t.project_id = ? AND (?1 IS NULL OR a.status = ?2)
             ORDER BY a.created_at DESC",
        )
        .bind(project_id.to_string())
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_attempt).collect()
    }

    async fn has_active_attempt(&self, task_id: Uuid) -> DomainResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM attempts WHERE task_id = ? AND status IN ('pending', 'queued', 'running')",
        )
        .bind(task_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.get("n");
        Ok(count > 0)
    }

    async fn update_attempt(&self, attempt: &Attempt) -> DomainResult<()> {
        sqlx::query(
            "UPDATE attempts SET status = ?, git_branch = ?, working_copy_path = ?, result = ?, diff = ?, error_message = ?, files_changed = ?, started_at = ?, completed_at = ?
             WHERE id = ?",
        )
        .bind(attempt.status.as_str())
        .bind(&attempt.git_branch)
        .bind(&attempt.working_copy_path)
        .bind(&attempt.result)
        .bind(&attempt.diff)
        .bind(&attempt.error_message)
        .bind(serde_json::to_string(&attempt.files_changed)?)
        .bind(attempt.started_at.map(|t| t.to_rfc3339()))
        .bind(attempt.completed_at.map(|t| t.to_rfc3339()))
        .bind(attempt.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_event(&self, event: &AttemptEvent) -> DomainResult<()> {
        let kind = match event.kind {
            EventKind::Log => "log",
            EventKind::Status => "status",
            EventKind::Progress => "progress",
            EventKind::Error => "error",
        };
        sqlx::query("INSERT INTO attempt_events (id, attempt_id, kind, message, metadata, timestamp) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(event.id.to_string())
            .bind(event.attempt_id.to_string())
            .bind(kind)
            .bind(&event.message)
            .bind(serde_json::to_string(&event.metadata)?)
            .bind(event.timestamp.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_events(&self, attempt_id: Uuid) -> DomainResult<Vec<AttemptEvent>> {
        let rows = sqlx::query("SELECT id, attempt_id, kind, message, metadata, timestamp FROM attempt_events WHERE attempt_id = ? ORDER BY timestamp")
            .bind(attempt_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let attempt_id: String = row.get("attempt_id");
                let kind: String = row.get("kind");
                let metadata: String = row.get("metadata");
                let timestamp: String = row.get("timestamp");
                Ok(AttemptEvent {
                    id: Uuid::from_str(&id).map_err(|e| DomainError::Serialization(e.to_string()))?,
                    attempt_id: Uuid::from_str(&attempt_id).map_err(|e| DomainError::Serialization(e.to_string()))?,
                    kind: match kind.as_str() {
                        "log" => EventKind::Log,
                        "status" => EventKind::Status,
                        "progress" => EventKind::Progress,
                        _ => EventKind::Error,
                    },
                    message: row.get("message"),
                    metadata: serde_json::from_str(&metadata)?,
                    timestamp: parse_ts(&timestamp)?,
                })
            })
            .collect()
    }

    async fn append_gate_result(&self, gate: &GateResult) -> DomainResult<()> {
        let kind = match gate.kind {
            GateKind::Test => "test",
            GateKind::Lint => "lint",
            GateKind::Build => "build",
        };
        let status = match gate.status {
            GateStatus::Passed => "passed",
            GateStatus::Failed => "failed",
            GateStatus::Skipped => "skipped",
        };
        sqlx::query("INSERT INTO gate_results (id, attempt_id, kind, status, output, duration_secs) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(gate.id.to_string())
            .bind(gate.attempt_id.to_string())
            .bind(kind)
            .bind(status)
            .bind(&gate.output)
            .bind(gate.duration_secs)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_gate_results(&self, attempt_id: Uuid) -> DomainResult<Vec<GateResult>> {
        let rows = sqlx::query("SELECT id, attempt_id, kind, status, output, duration_secs FROM gate_results WHERE attempt_id = ?")
            .bind(attempt_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let attempt_id: String = row.get("attempt_id");
                let kind: String = row.get("kind");
                let status: String = row.get("status");
                Ok(GateResult {
                    id: Uuid::from_str(&id).map_err(|e| DomainError::Serialization(e.to_string()))?,
                    attempt_id: Uuid::from_str(&attempt_id).map_err(|e| DomainError::Serialization(e.to_string()))?,
                    kind: match kind.as_str() {
                        "test" => GateKind::Test,
                        "lint" => GateKind::Lint,
                        _ => GateKind::Build,
                    },
                    status: match status.as_str() {
                        "passed" => GateStatus::Passed,
                        "failed" => GateStatus::Failed,
                        _ => GateStatus::Skipped,
                    },
                    output: row.get("output"),
                    duration_secs: row.get("duration_secs"),
                })
            })
            .collect()
    }
}
