//! Per-project scheduler: computes the ready set, enforces the concurrency
//! cap, dispatches runners, and handles cancellation/retry (C5).

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AttemptStatus, Graph, Task, TaskStatus};
use crate::domain::ports::{AttemptRepository, TaskRepository};
use crate::domain::models::Attempt;
use crate::services::attempt_runner::AttemptRunner;
use crate::services::event_bus::{project_topic, BusPayload, EventBus};

/// Outcome of a `schedule_project_tasks` cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResult {
    pub scheduled: Vec<Uuid>,
    pub already_running: usize,
    pub waiting: usize,
    pub completed: usize,
    pub errors: Vec<String>,
}

/// Summary returned by `get_execution_status`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStatus {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub in_review: usize,
    pub done: usize,
    pub failed: usize,
    pub progress_percent: f64,
    pub max_concurrent: usize,
    pub running_task_ids: Vec<Uuid>,
    pub ready_task_ids: Vec<Uuid>,
    pub blocked_count: usize,
    pub execution_level_count: usize,
    pub has_cycles: bool,
    pub is_complete: bool,
    pub reclaimable_attempt_count: usize,
}

/// Coordinates scheduling for a single project. Scoped to one
/// `(project_id, principal)` per the design: a fresh `Graph` is built from
/// the task table on every call, never cached between operations.
pub struct ExecutionCoordinator {
    tasks: Arc<dyn TaskRepository>,
    attempts: Arc<dyn AttemptRepository>,
    runner: Arc<AttemptRunner>,
    bus: EventBus,
    max_concurrent: usize,
}

impl ExecutionCoordinator {
    pub fn new(tasks: Arc<dyn TaskRepository>, attempts: Arc<dyn AttemptRepository>, runner: Arc<AttemptRunner>, bus: EventBus, max_concurrent: usize) -> Self {
        Self { tasks, attempts, runner, bus, max_concurrent }
    }

    /// The central scheduling primitive: dispatches as many ready tasks as
    /// there are free slots, spawning a runner task for each.
    #[tracing::instrument(skip(self), fields(project_id = %project_id))]
    pub async fn schedule_project_tasks(&self, project_id: Uuid) -> DomainResult<ScheduleResult> {
        let all_tasks = self.tasks.list_tasks(project_id).await?;
        let running = all_tasks.iter().filter(|t| t.status == TaskStatus::InProgress).count();
        let available = self.max_concurrent.saturating_sub(running);

        let completed = all_tasks.iter().filter(|t| t.status == TaskStatus::Done).count();

        if available == 0 {
            let waiting = all_tasks.iter().filter(|t| t.status == TaskStatus::Todo).count();
            return Ok(ScheduleResult {
                scheduled: Vec::new(),
                already_running: running,
                waiting,
                completed,
                errors: Vec::new(),
            });
        }

        let graph = Graph::from_tasks(&all_tasks);
        let ready_ids = graph.ready_tasks(None);
        let by_id: std::collections::HashMap<Uuid, &Task> = all_tasks.iter().map(|t| (t.id, t)).collect();

        let mut scheduled = Vec::new();
        let mut errors = Vec::new();

        for task_id in ready_ids.into_iter().take(available) {
            let Some(task) = by_id.get(&task_id) else { continue };
            match self.dispatch_one(task).await {
                Ok(()) => scheduled.push(task_id),
                Err(err) => errors.push(format!("{task_id}: {err}")),
            }
        }

        let waiting = all_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Todo && !scheduled.contains(&t.id))
            .count();

        Ok(ScheduleResult {
            scheduled,
            already_running: running,
            waiting,
            completed,
            errors,
        })
    }

    async fn dispatch_one(&self, task: &Task) -> DomainResult<()> {
        if self.attempts.has_active_attempt(task.id).await? {
            return Ok(());
        }

        let mut attempt = Attempt::new(task.id, task.agent_role);
        attempt.transition_to(AttemptStatus::Queued)?;
        self.attempts.create_attempt(&attempt).await?;
        self.tasks.update_task_status(task.id, TaskStatus::Todo, TaskStatus::InProgress).await?;
        self.bus
            .publish(project_topic(task.project_id), BusPayload::TaskUpdate { task_id: task.id, status: TaskStatus::InProgress.to_string() })
            .await;

        let runner = Arc::clone(&self.runner);
        let attempt_id = attempt.id;
        tokio::spawn(async move {
            if let Err(err) = runner.run(attempt_id).await {
                tracing::error!(%attempt_id, error = %err, "attempt runner failed");
            }
        });

        Ok(())
    }

    /// Returns a point-in-time summary of the project's execution state.
    pub async fn get_execution_status(&self, project_id: Uuid) -> DomainResult<ExecutionStatus> {
        let tasks = self.tasks.list_tasks(project_id).await?;
        let graph = Graph::from_tasks(&tasks);

        let total = tasks.len();
        let todo = tasks.iter().filter(|t| t.status == TaskStatus::Todo).count();
        let in_progress = tasks.iter().filter(|t| t.status == TaskStatus::InProgress).count();
        let in_review = tasks.iter().filter(|t| t.status == TaskStatus::InReview).count();
        let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
        let failed = tasks.iter().filter(|t| t.status == TaskStatus::Failed).count();

        let progress_percent = if total == 0 { 100.0 } else { (done as f64 / total as f64) * 100.0 };

        let running_task_ids = tasks.iter().filter(|t| t.status == TaskStatus::InProgress).map(|t| t.id).collect();
        let ready_task_ids = graph.ready_tasks(None);
        let blocked_count = graph.blocked_tasks(None).len();
        let has_cycles = graph.has_cycles();
        let execution_level_count = graph.execution_levels().map(|l| l.len()).unwrap_or(0);

        let attempts = self.attempts.list_attempts_for_project(project_id, None).await?;
        let now = chrono::Utc::now();
        let reclaimable_attempt_count = attempts
            .iter()
            .filter(|a| a.status.is_terminal())
            .filter(|a| a.completed_at.map(|c| now - c > chrono::Duration::hours(24)).unwrap_or(false))
            .count();

        Ok(ExecutionStatus {
            total,
            todo,
            in_progress,
            in_review,
            done,
            failed,
            progress_percent,
            max_concurrent: self.max_concurrent,
            running_task_ids,
            ready_task_ids,
            blocked_count,
            execution_level_count,
            has_cycles,
            is_complete: todo == 0 && in_progress == 0,
            reclaimable_attempt_count,
        })
    }

    /// Cancels every currently-running attempt in the project, resetting
    /// their tasks back to `Todo`.
    #[tracing::instrument(skip(self), fields(project_id = %project_id))]
    pub async fn cancel_all_running(&self, project_id: Uuid) -> DomainResult<usize> {
        let attempts = self.attempts.list_attempts_for_project(project_id, Some(AttemptStatus::Running)).await?;
        let mut cancelled = 0;
        for mut attempt in attempts {
            attempt.transition_to(AttemptStatus::Cancelled)?;
            self.attempts.update_attempt(&attempt).await?;
            self.tasks.update_task_status(attempt.task_id, TaskStatus::InProgress, TaskStatus::Todo).await?;
            self.bus
                .publish(project_topic(project_id), BusPayload::TaskUpdate { task_id: attempt.task_id, status: TaskStatus::Todo.to_string() })
                .await;
            cancelled += 1;
        }
        Ok(cancelled)
    }

    /// Flips every `Failed` task back to `Todo`, then re-invokes scheduling.
    #[tracing::instrument(skip(self), fields(project_id = %project_id))]
    pub async fn retry_failed_tasks(&self, project_id: Uuid) -> DomainResult<ScheduleResult> {
        let tasks = self.tasks.list_tasks(project_id).await?;
        for task in tasks.iter().filter(|t| t.status == TaskStatus::Failed) {
            self.tasks.update_task_status(task.id, TaskStatus::Failed, TaskStatus::Todo).await?;
        }
        self.schedule_project_tasks(project_id).await
    }
}
