//! Task: a unit of work in a project's dependency DAG.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;

/// The role an agent plays when executing a task; frozen onto the task's
/// attempts at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Pm,
    Frontend,
    Backend,
    Qa,
    Devops,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pm => "pm",
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Qa => "qa",
            Self::Devops => "devops",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pm" => Ok(Self::Pm),
            "frontend" => Ok(Self::Frontend),
            "backend" => Ok(Self::Backend),
            "qa" => Ok(Self::Qa),
            "devops" => Ok(Self::Devops),
            other => Err(DomainError::ValidationFailed(format!("unknown agent role: {other}"))),
        }
    }
}

/// Lifecycle status of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    InReview,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::InReview => "in_review",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// A task is "done" for dependency-satisfaction purposes only when `Done`.
    /// `InReview` deliberately does not satisfy dependents; the review gate
    /// must approve first.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Valid next states from this state, per the task lifecycle.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Todo => &[Self::InProgress],
            Self::InProgress => &[Self::InReview, Self::Todo, Self::Failed],
            Self::InReview => &[Self::Done, Self::Todo],
            Self::Done => &[],
            Self::Failed => &[Self::Todo],
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "in_review" => Ok(Self::InReview),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::ValidationFailed(format!("unknown task status: {other}"))),
        }
    }
}

/// A unit of work within a project's dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub agent_role: AgentRole,
    pub priority: u8,
    pub status: TaskStatus,
    pub dependencies: HashSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        acceptance_criteria: Vec<String>,
        agent_role: AgentRole,
        priority: u8,
        dependencies: HashSet<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            title: title.into(),
            description: description.into(),
            acceptance_criteria,
            agent_role,
            priority: priority.clamp(1, 5),
            status: TaskStatus::Todo,
            dependencies,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a status transition, validating it against the lifecycle table.
    pub fn transition_to(&mut self, next: TaskStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
