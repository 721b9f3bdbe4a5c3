//! Handlers for each CLI subcommand, operating against the same
//! coordinator/review-gate services the HTTP surface uses.

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::services::{ExecutionCoordinator, ReviewGateController};

/// Bundles the services a CLI invocation needs; constructed once in
/// `main` and passed to whichever handler the parsed command selects.
pub struct CommandContext {
    pub coordinator: Arc<ExecutionCoordinator>,
    pub review_gate: Arc<ReviewGateController>,
}

pub async fn schedule(ctx: &CommandContext, project_id: Uuid) -> Result<()> {
    let result = ctx.coordinator.schedule_project_tasks(project_id).await.context("scheduling project tasks")?;
    println!("scheduled: {:?}", result.scheduled);
    println!("already running: {}, waiting: {}, completed: {}", result.already_running, result.waiting, result.completed);
    if !result.errors.is_empty() {
        eprintln!("errors: {:?}", result.errors);
    }
    Ok(())
}

pub async fn status(ctx: &CommandContext, project_id: Uuid) -> Result<()> {
    let status = ctx.coordinator.get_execution_status(project_id).await.context("fetching execution status")?;
    println!(
        "{}/{} done ({:.1}%) — todo {}, in_progress {}, in_review {}, failed {}",
        status.done, status.total, status.progress_percent, status.todo, status.in_progress, status.in_review, status.failed
    );
    println!("max_concurrent: {}, running: {:?}", status.max_concurrent, status.running_task_ids);
    println!("ready: {:?}, blocked: {}", status.ready_task_ids, status.blocked_count);
    if status.has_cycles {
        println!("warning: dependency graph contains a cycle");
    }
    if status.is_complete {
        println!("project complete");
    }
    Ok(())
}

pub async fn cancel_all(ctx: &CommandContext, project_id: Uuid) -> Result<()> {
    let cancelled = ctx.coordinator.cancel_all_running(project_id).await.context("cancelling running attempts")?;
    println!("cancelled {cancelled} attempt(s)");
    Ok(())
}

pub async fn retry_failed(ctx: &CommandContext, project_id: Uuid) -> Result<()> {
    let result = ctx.coordinator.retry_failed_tasks(project_id).await.context("retrying failed tasks")?;
    println!("rescheduled: {:?}", result.scheduled);
    Ok(())
}

pub async fn approve(ctx: &CommandContext, attempt_id: Uuid) -> Result<()> {
    let outcome = ctx.review_gate.approve(attempt_id).await.context("approving attempt")?;
    println!("merged: {}, cascade scheduled: {:?}", outcome.merged, outcome.cascade.scheduled);
    Ok(())
}

pub async fn reject(ctx: &CommandContext, attempt_id: Uuid, feedback: Option<String>) -> Result<()> {
    ctx.review_gate.reject(attempt_id, feedback).await.context("rejecting attempt")?;
    println!("attempt {attempt_id} rejected");
    Ok(())
}

pub async fn cancel(ctx: &CommandContext, attempt_id: Uuid) -> Result<()> {
    ctx.review_gate.cancel(attempt_id).await.context("cancelling attempt")?;
    println!("attempt {attempt_id} cancelled");
    Ok(())
}
