//! Attempt: one execution of a task by the external Worker, plus its
//! append-only event log and quality-gate results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::task::AgentRole;

/// Lifecycle status of an [`Attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
    Approved,
    Rejected,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Cancelled | Self::Approved | Self::Rejected
        )
    }

    /// True while this attempt occupies the single "active attempt" slot
    /// on its task (the single-flight invariant in the store).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Queued | Self::Running)
    }

    pub fn valid_transitions(&self) -> &'static [AttemptStatus] {
        match self {
            Self::Pending => &[Self::Queued, Self::Cancelled],
            Self::Queued => &[Self::Running, Self::Cancelled],
            Self::Running => &[Self::Success, Self::Failed, Self::Cancelled],
            Self::Success => &[Self::Approved, Self::Rejected],
            Self::Failed => &[Self::Rejected],
            Self::Cancelled | Self::Approved | Self::Rejected => &[],
        }
    }

    pub fn can_transition_to(&self, next: AttemptStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::ValidationFailed(format!("unknown attempt status: {other}"))),
        }
    }
}

/// One execution of a task's work by the external Worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub task_id: Uuid,
    pub agent_role: AgentRole,
    pub status: AttemptStatus,
    pub git_branch: Option<String>,
    pub working_copy_path: Option<String>,
    pub result: Option<String>,
    pub diff: Option<String>,
    pub error_message: Option<String>,
    pub files_changed: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Attempt {
    pub fn new(task_id: Uuid, agent_role: AgentRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            agent_role,
            status: AttemptStatus::Pending,
            git_branch: None,
            working_copy_path: None,
            result: None,
            diff: None,
            error_message: None,
            files_changed: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Branch naming convention shared with the Worker RPC contract:
    /// `agent-{role-lowercase}-{task_id_prefix_8}`.
    pub fn branch_name_for(agent_role: AgentRole, task_id: Uuid) -> String {
        let prefix: String = task_id.simple().to_string().chars().take(8).collect();
        format!("agent-{}-{}", agent_role.as_str(), prefix)
    }

    pub fn transition_to(&mut self, next: AttemptStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if next == AttemptStatus::Running {
            self.started_at = Some(Utc::now());
        }
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Wall-clock duration of the attempt, measured against `now` if still running.
    pub fn duration(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let start = self.started_at?;
        let end = self.completed_at.unwrap_or(now);
        Some(end - start)
    }
}

/// The kind of an [`AttemptEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Log,
    Status,
    Progress,
    Error,
}

/// An append-only log entry belonging to an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptEvent {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub kind: EventKind,
    pub message: String,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AttemptEvent {
    pub fn new(attempt_id: Uuid, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempt_id,
            kind,
            message: message.into(),
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The kind of quality gate a [`GateResult`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Test,
    Lint,
    Build,
}

/// Outcome of running one quality gate during an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    Skipped,
}

/// A single quality-gate outcome (test/lint/build) recorded for an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub kind: GateKind,
    pub status: GateStatus,
    pub output: String,
    pub duration_secs: f64,
}

impl GateResult {
    pub fn new(attempt_id: Uuid, kind: GateKind, status: GateStatus, output: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempt_id,
            kind,
            status,
            output: output.into(),
            duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_name_matches_convention() {
        let id = Uuid::new_v4();
        let name = Attempt::branch_name_for(AgentRole::Backend, id);
        assert!(name.starts_with("agent-backend-"));
        assert_eq!(name.len(), "agent-backend-".len() + 8);
    }

    #[test]
    fn success_can_only_be_reviewed_not_rerun() {
        assert!(AttemptStatus::Success.can_transition_to(AttemptStatus::Approved));
        assert!(AttemptStatus::Success.can_transition_to(AttemptStatus::Rejected));
        assert!(!AttemptStatus::Success.can_transition_to(AttemptStatus::Running));
    }

    #[test]
    fn cancelled_attempt_rejects_late_terminal_transition() {
        let mut attempt = Attempt::new(Uuid::new_v4(), AgentRole::Qa);
        attempt.transition_to(AttemptStatus::Queued).unwrap();
        attempt.transition_to(AttemptStatus::Running).unwrap();
        attempt.transition_to(AttemptStatus::Cancelled).unwrap();
        let err = attempt.transition_to(AttemptStatus::Success).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));
    }
}
