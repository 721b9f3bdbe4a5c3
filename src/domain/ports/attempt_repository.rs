//! Port for persisted Attempt, AttemptEvent, and GateResult records (C3).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Attempt, AttemptEvent, AttemptStatus, GateResult};

/// Persistence boundary for attempts and their events/gate results.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn create_attempt(&self, attempt: &Attempt) -> DomainResult<()>;
    async fn get_attempt(&self, id: Uuid) -> DomainResult<Attempt>;
    async fn list_attempts_for_task(&self, task_id: Uuid) -> DomainResult<Vec<Attempt>>;
    async fn list_attempts_for_project(&self, project_id: Uuid, status: Option<AttemptStatus>) -> DomainResult<Vec<Attempt>>;

    /// Whether `task_id` already has an attempt in an active (non-terminal) status.
    async fn has_active_attempt(&self, task_id: Uuid) -> DomainResult<bool>;

    async fn update_attempt(&self, attempt: &Attempt) -> DomainResult<()>;

    async fn append_event(&self, event: &AttemptEvent) -> DomainResult<()>;
    async fn list_events(&self, attempt_id: Uuid) -> DomainResult<Vec<AttemptEvent>>;

    async fn append_gate_result(&self, gate: &GateResult) -> DomainResult<()>;
    async fn list_gate_results(&self, attempt_id: Uuid) -> DomainResult<Vec<GateResult>>;
}
