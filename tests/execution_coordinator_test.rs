//! End-to-end scenarios over the coordinator, runner, and review gate,
//! backed by an in-memory SQLite pool and a scripted worker.

mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use swarmctl::adapters::sqlite::{SqliteAttemptRepository, SqliteTaskRepository};
use swarmctl::domain::models::{AgentRole, Project, Task, TaskStatus};
use swarmctl::services::{AttemptRunner, EventBus, ExecutionCoordinator, ReviewGateController};

use support::{in_memory_pool, MockWorkerClient};

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

struct Fixture {
    project_id: Uuid,
    tasks: Arc<SqliteTaskRepository>,
    attempts: Arc<SqliteAttemptRepository>,
    worker: Arc<MockWorkerClient>,
    coordinator: Arc<ExecutionCoordinator>,
    review_gate: Arc<ReviewGateController>,
}

async fn build_fixture(max_concurrent: usize) -> Fixture {
    let pool = in_memory_pool().await;
    let tasks: Arc<SqliteTaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let attempts: Arc<SqliteAttemptRepository> = Arc::new(SqliteAttemptRepository::new(pool));
    let worker = Arc::new(MockWorkerClient::default());
    let bus = EventBus::new();

    let project = Project::new("demo", "demo project", "/tmp/demo-repo", Uuid::new_v4());
    tasks.create_project(&project).await.unwrap();

    let runner = Arc::new(AttemptRunner::new(attempts.clone(), tasks.clone(), worker.clone(), bus.clone()));
    let coordinator = Arc::new(ExecutionCoordinator::new(tasks.clone(), attempts.clone(), runner, bus.clone(), max_concurrent));
    let review_gate = Arc::new(ReviewGateController::new(attempts.clone(), tasks.clone(), worker.clone(), coordinator.clone()));

    Fixture {
        project_id: project.id,
        tasks,
        attempts,
        worker,
        coordinator,
        review_gate,
    }
}

fn new_task(project_id: Uuid, priority: u8, deps: &[Uuid]) -> Task {
    Task::new(project_id, "t", "d", vec![], AgentRole::Backend, priority, deps.iter().copied().collect())
}

/// S1: a diamond A->B, A->C with MAX_CONCURRENT=2 only dispatches the root.
#[tokio::test]
async fn s1_only_ready_root_is_scheduled_under_diamond() {
    let fx = build_fixture(2).await;
    let a = new_task(fx.project_id, 2, &[]);
    let b = new_task(fx.project_id, 2, &[a.id]);
    let c = new_task(fx.project_id, 2, &[a.id]);
    for t in [&a, &b, &c] {
        fx.tasks.create_task(t).await.unwrap();
    }

    let result = fx.coordinator.schedule_project_tasks(fx.project_id).await.unwrap();
    assert_eq!(result.scheduled, vec![a.id]);
    assert_eq!(result.waiting, 2);
}

/// S2: after approving A, both B and C (now ready) dispatch together.
#[tokio::test]
async fn s2_approval_cascades_to_dependents() {
    let fx = build_fixture(2).await;
    let a = new_task(fx.project_id, 2, &[]);
    let b = new_task(fx.project_id, 2, &[a.id]);
    let c = new_task(fx.project_id, 2, &[a.id]);
    for t in [&a, &b, &c] {
        fx.tasks.create_task(t).await.unwrap();
    }

    fx.coordinator.schedule_project_tasks(fx.project_id).await.unwrap();
    settle().await;

    let attempts = fx.attempts.list_attempts_for_task(a.id).await.unwrap();
    let attempt = attempts.into_iter().next().expect("attempt A should exist");
    let outcome = fx.review_gate.approve(attempt.id).await.unwrap();

    assert!(outcome.merged);
    let mut scheduled = outcome.cascade.scheduled.clone();
    scheduled.sort();
    let mut expected = vec![b.id, c.id];
    expected.sort();
    assert_eq!(scheduled, expected);

    let task_a = fx.tasks.get_task(a.id).await.unwrap();
    assert_eq!(task_a.status, TaskStatus::Done);
}

/// S3: a chain A->B->C->D with A done, B in progress leaves C and D waiting.
#[tokio::test]
async fn s3_chain_blocks_on_in_progress_predecessor() {
    let fx = build_fixture(4).await;
    let a = new_task(fx.project_id, 2, &[]);
    let b = new_task(fx.project_id, 2, &[a.id]);
    let c = new_task(fx.project_id, 2, &[b.id]);
    let d = new_task(fx.project_id, 2, &[c.id]);
    for t in [&a, &b, &c, &d] {
        fx.tasks.create_task(t).await.unwrap();
    }
    fx.tasks.update_task_status(a.id, TaskStatus::Todo, TaskStatus::InProgress).await.unwrap();
    fx.tasks.update_task_status(a.id, TaskStatus::InProgress, TaskStatus::InReview).await.unwrap();
    fx.tasks.update_task_status(a.id, TaskStatus::InReview, TaskStatus::Done).await.unwrap();
    fx.tasks.update_task_status(b.id, TaskStatus::Todo, TaskStatus::InProgress).await.unwrap();

    let result = fx.coordinator.schedule_project_tasks(fx.project_id).await.unwrap();
    assert!(result.scheduled.is_empty());
    assert_eq!(result.waiting, 2);
}

/// S4: a worker that always errors transport-wise exhausts its bounded
/// retries (3 attempts, one ERROR event each) and ends up Failed, with its
/// task reset to Todo. Runs with paused virtual time so the fixed 30s
/// backoff doesn't slow the suite.
#[tokio::test(start_paused = true)]
async fn s4_transport_failure_exhausts_retries_and_resets_task() {
    use swarmctl::domain::models::{Attempt, AttemptStatus};

    let fx = build_fixture(1).await;
    let a = new_task(fx.project_id, 2, &[]);
    fx.tasks.create_task(&a).await.unwrap();
    fx.tasks.update_task_status(a.id, TaskStatus::Todo, TaskStatus::InProgress).await.unwrap();

    let mut attempt = Attempt::new(a.id, AgentRole::Backend);
    attempt.transition_to(AttemptStatus::Queued).unwrap();
    fx.attempts.create_attempt(&attempt).await.unwrap();
    fx.worker.always_transport_fail(attempt.id);

    let bus = EventBus::new();
    let runner = AttemptRunner::new(fx.attempts.clone(), fx.tasks.clone(), fx.worker.clone(), bus);
    runner.run(attempt.id).await.unwrap();

    let attempt_after = fx.attempts.get_attempt(attempt.id).await.unwrap();
    assert_eq!(attempt_after.status, AttemptStatus::Failed);

    let task_after = fx.tasks.get_task(a.id).await.unwrap();
    assert_eq!(task_after.status, TaskStatus::Todo);

    let events = fx.attempts.list_events(attempt.id).await.unwrap();
    let error_events = events.iter().filter(|e| matches!(e.kind, swarmctl::domain::models::EventKind::Error)).count();
    assert_eq!(error_events, 3, "expected one ERROR event per retried transport failure");
}

/// S5: cancelling all running attempts resets tasks to Todo immediately.
#[tokio::test]
async fn s5_cancel_all_running_resets_tasks() {
    let fx = build_fixture(1).await;
    let a = new_task(fx.project_id, 2, &[]);
    fx.tasks.create_task(&a).await.unwrap();

    fx.coordinator.schedule_project_tasks(fx.project_id).await.unwrap();

    // Force the attempt into Running without waiting for the spawned runner,
    // to exercise cancellation against an attempt mid-flight.
    let attempts = fx.attempts.list_attempts_for_task(a.id).await.unwrap();
    let mut attempt = attempts.into_iter().next().unwrap();
    if attempt.status == swarmctl::domain::models::AttemptStatus::Queued {
        attempt.transition_to(swarmctl::domain::models::AttemptStatus::Running).unwrap();
        fx.attempts.update_attempt(&attempt).await.unwrap();
    }

    let cancelled = fx.coordinator.cancel_all_running(fx.project_id).await.unwrap();
    assert_eq!(cancelled, 1);

    let task = fx.tasks.get_task(a.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Todo);

    let attempt_after = fx.attempts.get_attempt(attempt.id).await.unwrap();
    assert_eq!(attempt_after.status, swarmctl::domain::models::AttemptStatus::Cancelled);
}

/// S6: a cyclic graph reports has_cycles and an empty execution-level count.
#[tokio::test]
async fn s6_cyclic_graph_reports_zero_levels() {
    let fx = build_fixture(4).await;
    let mut a = new_task(fx.project_id, 2, &[]);
    let mut b = new_task(fx.project_id, 2, &[]);
    a.dependencies = HashSet::from([b.id]);
    b.dependencies = HashSet::from([a.id]);
    fx.tasks.create_task(&a).await.unwrap();
    fx.tasks.create_task(&b).await.unwrap();

    let status = fx.coordinator.get_execution_status(fx.project_id).await.unwrap();
    assert!(status.has_cycles);
    assert_eq!(status.execution_level_count, 0);
}

#[tokio::test]
async fn empty_project_reports_complete() {
    let fx = build_fixture(4).await;
    let status = fx.coordinator.get_execution_status(fx.project_id).await.unwrap();
    assert!(status.is_complete);
}

#[tokio::test]
async fn zero_concurrency_never_dispatches() {
    let fx = build_fixture(0).await;
    let a = new_task(fx.project_id, 2, &[]);
    fx.tasks.create_task(&a).await.unwrap();
    let result = fx.coordinator.schedule_project_tasks(fx.project_id).await.unwrap();
    assert!(result.scheduled.is_empty());
}
