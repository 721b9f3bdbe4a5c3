//! Drives a single attempt from `Queued` to a terminal state (C4).

use std::sync::Arc;
use std::time::Duration;

use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AttemptEvent, AttemptStatus, EventKind, GateResult, GateStatus, TaskStatus};
use crate::domain::ports::worker_client::{RunAgentProject, RunAgentRequest, RunAgentTask};
use crate::domain::ports::{AttemptRepository, TaskRepository, WorkerClient};
use crate::services::event_bus::{project_topic, BusPayload, EventBus};

/// Fixed retry backoff for transport errors talking to the worker.
const TRANSPORT_RETRY_INTERVAL: Duration = Duration::from_secs(30);
/// Bounds the fixed-interval retry loop to three attempts total.
const TRANSPORT_MAX_ELAPSED: Duration = Duration::from_secs(91);

/// Model identifier passed through to the worker; fixed for now, not yet
/// configurable per task.
const DEFAULT_MODEL: &str = "default";

/// Executes attempts against the external worker, updating attempt/task
/// state and emitting events as it goes.
pub struct AttemptRunner {
    attempts: Arc<dyn AttemptRepository>,
    tasks: Arc<dyn TaskRepository>,
    worker: Arc<dyn WorkerClient>,
    bus: EventBus,
}

impl AttemptRunner {
    pub fn new(attempts: Arc<dyn AttemptRepository>, tasks: Arc<dyn TaskRepository>, worker: Arc<dyn WorkerClient>, bus: EventBus) -> Self {
        Self { attempts, tasks, worker, bus }
    }

    /// Runs one attempt to completion. Returns `Ok(())` even when the
    /// attempt itself ends in `Failed`; only store/lookup failures are
    /// propagated as an `Err`.
    #[tracing::instrument(skip(self), fields(attempt_id = %attempt_id))]
    pub async fn run(&self, attempt_id: Uuid) -> DomainResult<()> {
        let mut attempt = self.attempts.get_attempt(attempt_id).await?;
        let task = self.tasks.get_task(attempt.task_id).await?;
        let project = self.tasks.get_project(task.project_id).await?;

        attempt.transition_to(AttemptStatus::Running)?;
        self.attempts.update_attempt(&attempt).await?;
        self.emit(attempt_id, EventKind::Status, format!("starting {} execution", task.agent_role)).await?;
        self.bus
            .publish(project_topic(project.id), BusPayload::TaskUpdate { task_id: task.id, status: task.status.to_string() })
            .await;

        let request = RunAgentRequest {
            attempt_id,
            task: RunAgentTask {
                id: task.id,
                title: task.title.clone(),
                description: task.description.clone(),
                agent_role: task.agent_role,
                acceptance_criteria: task.acceptance_criteria.clone(),
            },
            project: RunAgentProject {
                name: project.name.clone(),
                description: project.description.clone(),
                repo_path: project.repo_path.clone(),
                config: project.config.clone(),
            },
            writable_roots: vec![project.repo_path.clone()],
            model: DEFAULT_MODEL.to_string(),
        };

        let outcome = self.call_worker_with_retry(attempt_id, request).await;

        // A concurrent cancellation may have already finalized this attempt;
        // a late worker result must not resurrect it.
        let current = self.attempts.get_attempt(attempt_id).await?;
        if current.status != AttemptStatus::Running {
            tracing::info!(status = %current.status, "discarding late worker result for non-running attempt");
            return Ok(());
        }
        attempt = current;

        match outcome {
            Ok(response) if response.success => {
                attempt.git_branch = response.git_branch;
                attempt.working_copy_path = response.worktree_path;
                attempt.diff = response.diff;
                attempt.files_changed = response.files_changed;
                attempt.result = response.output;
                attempt.transition_to(AttemptStatus::Success)?;
                self.attempts.update_attempt(&attempt).await?;

                for gate in response.gate_results {
                    let status_label = match gate.status {
                        GateStatus::Passed => "passed",
                        GateStatus::Failed => "failed",
                        GateStatus::Skipped => "skipped",
                    };
                    self.attempts
                        .append_gate_result(&GateResult::new(attempt_id, gate.kind, gate.status, format!("{status_label}: {}", gate.output), gate.duration_secs))
                        .await?;
                }

                self.tasks.update_task_status(task.id, TaskStatus::InProgress, TaskStatus::InReview).await?;
                self.emit(attempt_id, EventKind::Status, "execution succeeded, awaiting review").await?;
            }
            Ok(response) => {
                attempt.error_message = response.error.clone();
                attempt.transition_to(AttemptStatus::Failed)?;
                self.attempts.update_attempt(&attempt).await?;
                self.tasks.update_task_status(task.id, TaskStatus::InProgress, TaskStatus::Todo).await?;
                self.emit(attempt_id, EventKind::Error, response.error.unwrap_or_else(|| "worker reported failure".to_string())).await?;
            }
            Err(err) => {
                attempt.error_message = Some(err.to_string());
                attempt.transition_to(AttemptStatus::Failed)?;
                self.attempts.update_attempt(&attempt).await?;
                self.tasks.update_task_status(task.id, TaskStatus::InProgress, TaskStatus::Todo).await?;
                // Transport failures already got one ERROR event per retry
                // attempt inside `call_worker_with_retry`; don't double up.
                if !matches!(err, DomainError::Transport(_)) {
                    self.emit(attempt_id, EventKind::Error, err.to_string()).await?;
                }
            }
        }

        self.bus
            .publish(project_topic(project.id), BusPayload::TaskUpdate { task_id: task.id, status: attempt.status.to_string() })
            .await;
        Ok(())
    }

    /// Retries only transport errors, with a fixed 30s interval bounded to
    /// three attempts total. Worker-reported failures and protocol errors
    /// are not retried. Each transient failure appends its own `ERROR`
    /// event, so a caller reviewing the attempt's log sees one entry per
    /// failed call to the worker, not a single summary at the end.
    async fn call_worker_with_retry(
        &self,
        attempt_id: Uuid,
        request: RunAgentRequest,
    ) -> Result<crate::domain::ports::worker_client::RunAgentResponse, DomainError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(TRANSPORT_RETRY_INTERVAL)
            .with_max_interval(TRANSPORT_RETRY_INTERVAL)
            .with_multiplier(1.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(Some(TRANSPORT_MAX_ELAPSED))
            .build();

        retry(policy, || {
            let request = request.clone();
            async {
                self.worker.run_agent(request).await.map_err(|err| match err {
                    DomainError::Transport(_) => {
                        let _ = self.emit(attempt_id, EventKind::Error, err.to_string()).await;
                        backoff::Error::transient(err)
                    }
                    other => backoff::Error::permanent(other),
                })
            }
        })
        .await
    }

    async fn emit(&self, attempt_id: Uuid, kind: EventKind, message: impl Into<String>) -> DomainResult<()> {
        self.attempts.append_event(&AttemptEvent::new(attempt_id, kind, message)).await
    }
}
