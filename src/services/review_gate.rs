//! Human-in-the-loop review gate: approve/reject/cancel a finished attempt,
//! merge or discard its branch, and cascade scheduling on approval (C6).

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Attempt, AttemptStatus, TaskStatus};
use crate::domain::ports::worker_client::{CleanupRequest, MergeBranchRequest};
use crate::domain::ports::{AttemptRepository, TaskRepository, WorkerClient};
use crate::services::execution_coordinator::{ExecutionCoordinator, ScheduleResult};

const TARGET_BRANCH: &str = "main";

/// Result of a successful approve: whether the merge happened and what
/// scheduling cascade it triggered.
#[derive(Debug, Clone)]
pub struct ApproveOutcome {
    pub merged: bool,
    pub cascade: ScheduleResult,
}

/// Implements the approve/reject/cancel actions over a completed attempt.
pub struct ReviewGateController {
    attempts: Arc<dyn AttemptRepository>,
    tasks: Arc<dyn TaskRepository>,
    worker: Arc<dyn WorkerClient>,
    coordinator: Arc<ExecutionCoordinator>,
}

impl ReviewGateController {
    pub fn new(attempts: Arc<dyn AttemptRepository>, tasks: Arc<dyn TaskRepository>, worker: Arc<dyn WorkerClient>, coordinator: Arc<ExecutionCoordinator>) -> Self {
        Self { attempts, tasks, worker, coordinator }
    }

    /// Approves a `Success` attempt: merges its branch, marks the task
    /// `Done`, cleans up the worktree, then re-invokes scheduling so newly
    /// unblocked tasks dispatch. This is the only point in the system that
    /// automatically cascades scheduling after an attempt completes.
    #[tracing::instrument(skip(self), fields(attempt_id = %attempt_id))]
    pub async fn approve(&self, attempt_id: Uuid) -> DomainResult<ApproveOutcome> {
        let mut attempt = self.attempts.get_attempt(attempt_id).await?;
        self.require_status(&attempt, AttemptStatus::Success)?;
        let task = self.tasks.get_task(attempt.task_id).await?;
        let project = self.tasks.get_project(task.project_id).await?;

        let branch = attempt
            .git_branch
            .clone()
            .unwrap_or_else(|| Attempt::branch_name_for(attempt.agent_role, task.id));

        let merge = self
            .worker
            .merge_branch(MergeBranchRequest {
                repo_path: project.repo_path.clone(),
                branch_name: branch.clone(),
                target_branch: TARGET_BRANCH.to_string(),
            })
            .await?;

        if !merge.success {
            if merge.conflict {
                return Err(DomainError::MergeConflict(branch));
            }
            return Err(DomainError::WorkerReported(merge.error.unwrap_or_else(|| "merge failed".to_string())));
        }

        attempt.transition_to(AttemptStatus::Approved)?;
        self.attempts.update_attempt(&attempt).await?;
        self.tasks.update_task_status(task.id, TaskStatus::InReview, TaskStatus::Done).await?;

        let _ = self
            .worker
            .cleanup(CleanupRequest {
                repo_path: project.repo_path.clone(),
                worktree_path_or_branch: attempt.working_copy_path.clone().unwrap_or(branch),
            })
            .await;

        let cascade = self.coordinator.schedule_project_tasks(project.id).await?;
        Ok(ApproveOutcome { merged: true, cascade })
    }

    /// Rejects an attempt that ended in `Success` or `Failed`, resetting its
    /// task to `Todo` for a manual or worker-side redo.
    #[tracing::instrument(skip(self), fields(attempt_id = %attempt_id))]
    pub async fn reject(&self, attempt_id: Uuid, feedback: Option<String>) -> DomainResult<()> {
        let mut attempt = self.attempts.get_attempt(attempt_id).await?;
        if !matches!(attempt.status, AttemptStatus::Success | AttemptStatus::Failed) {
            return Err(DomainError::IllegalTransition {
                from: attempt.status.to_string(),
                to: AttemptStatus::Rejected.to_string(),
            });
        }
        let task = self.tasks.get_task(attempt.task_id).await?;
        let project = self.tasks.get_project(task.project_id).await?;

        if let Some(feedback) = feedback {
            attempt.result = Some(feedback);
        }
        let from_task_status = task.status;
        attempt.transition_to(AttemptStatus::Rejected)?;
        self.attempts.update_attempt(&attempt).await?;
        self.tasks.update_task_status(task.id, from_task_status, TaskStatus::Todo).await?;

        if let Some(branch) = &attempt.git_branch {
            let _ = self
                .worker
                .cleanup(CleanupRequest {
                    repo_path: project.repo_path.clone(),
                    worktree_path_or_branch: attempt.working_copy_path.clone().unwrap_or_else(|| branch.clone()),
                })
                .await;
        }
        Ok(())
    }

    /// Cancels an attempt still in `Pending`, `Queued`, or `Running`.
    #[tracing::instrument(skip(self), fields(attempt_id = %attempt_id))]
    pub async fn cancel(&self, attempt_id: Uuid) -> DomainResult<()> {
        let mut attempt = self.attempts.get_attempt(attempt_id).await?;
        if !attempt.status.is_active() {
            return Err(DomainError::IllegalTransition {
                from: attempt.status.to_string(),
                to: AttemptStatus::Cancelled.to_string(),
            });
        }
        let task = self.tasks.get_task(attempt.task_id).await?;
        let project = self.tasks.get_project(task.project_id).await?;

        attempt.transition_to(AttemptStatus::Cancelled)?;
        self.attempts.update_attempt(&attempt).await?;
        self.tasks.update_task_status(task.id, task.status, TaskStatus::Todo).await?;

        if let Some(branch) = &attempt.git_branch {
            let _ = self
                .worker
                .cleanup(CleanupRequest {
                    repo_path: project.repo_path.clone(),
                    worktree_path_or_branch: branch.clone(),
                })
                .await;
        }
        Ok(())
    }

    fn require_status(&self, attempt: &Attempt, expected: AttemptStatus) -> DomainResult<()> {
        if attempt.status != expected {
            return Err(DomainError::IllegalTransition {
                from: attempt.status.to_string(),
                to: expected.to_string(),
            });
        }
        Ok(())
    }
}
