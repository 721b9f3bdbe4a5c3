//! Route definitions and handlers for the orchestrator HTTP surface.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::Graph;
use crate::domain::ports::TaskRepository;
use crate::services::{EventBus, ExecutionCoordinator, ReviewGateController};

use super::ws::ws_handler;

/// Shared state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<dyn TaskRepository>,
    pub coordinator: Arc<ExecutionCoordinator>,
    pub review_gate: Arc<ReviewGateController>,
    pub bus: EventBus,
}

/// Assembles the full router: orchestration endpoints plus CORS and
/// request tracing layers, matching the rest of the ambient stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/project/:id/execute-all-tasks", post(execute_all_tasks))
        .route("/project/:id/execution-status", get(execution_status))
        .route("/project/:id/cancel-all", post(cancel_all))
        .route("/project/:id/retry-failed", post(retry_failed))
        .route("/attempt/:id/approve", post(approve_attempt))
        .route("/attempt/:id/reject", post(reject_attempt))
        .route("/attempt/:id/cancel", post(cancel_attempt))
        .route("/task/:id/dependencies-status", get(dependencies_status))
        .route("/task/ready", get(ready_tasks))
        .route("/task/project-dependency-graph", get(project_dependency_graph))
        .route("/ws/project/:id", get(ws_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn domain_error_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::ProjectNotFound(_) | DomainError::TaskNotFound(_) | DomainError::AttemptNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::IllegalTransition { .. } | DomainError::DependencyUnmet(..) | DomainError::CycleDetected(_) | DomainError::ValidationFailed(_) => {
            StatusCode::BAD_REQUEST
        }
        DomainError::MergeConflict(_) => StatusCode::CONFLICT,
        DomainError::Transport(_) | DomainError::WorkerReported(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: DomainError) -> axum::response::Response {
    let status = domain_error_status(&err);
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

async fn execute_all_tasks(State(state): State<AppState>, Path(project_id): Path<Uuid>) -> axum::response::Response {
    match state.coordinator.schedule_project_tasks(project_id).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => error_response(err),
    }
}

async fn execution_status(State(state): State<AppState>, Path(project_id): Path<Uuid>) -> axum::response::Response {
    match state.coordinator.get_execution_status(project_id).await {
        Ok(status) => Json(status).into_response(),
        Err(err) => error_response(err),
    }
}

async fn cancel_all(State(state): State<AppState>, Path(project_id): Path<Uuid>) -> axum::response::Response {
    match state.coordinator.cancel_all_running(project_id).await {
        Ok(count) => Json(json!({ "cancelled": count })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn retry_failed(State(state): State<AppState>, Path(project_id): Path<Uuid>) -> axum::response::Response {
    match state.coordinator.retry_failed_tasks(project_id).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => error_response(err),
    }
}

async fn approve_attempt(State(state): State<AppState>, Path(attempt_id): Path<Uuid>) -> axum::response::Response {
    match state.review_gate.approve(attempt_id).await {
        Ok(outcome) => Json(json!({ "merged": outcome.merged, "cascade": outcome.cascade })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn reject_attempt(State(state): State<AppState>, Path(attempt_id): Path<Uuid>) -> axum::response::Response {
    match state.review_gate.reject(attempt_id, None).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

async fn cancel_attempt(State(state): State<AppState>, Path(attempt_id): Path<Uuid>) -> axum::response::Response {
    match state.review_gate.cancel(attempt_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

async fn dependencies_status(State(state): State<AppState>, Path(task_id): Path<Uuid>) -> axum::response::Response {
    let task = match state.tasks.get_task(task_id).await {
        Ok(task) => task,
        Err(err) => return error_response(err),
    };
    let tasks = match state.tasks.list_tasks(task.project_id).await {
        Ok(tasks) => tasks,
        Err(err) => return error_response(err),
    };
    let graph = Graph::from_tasks(&tasks);
    Json(graph.can_start(task_id, None)).into_response()
}

async fn ready_tasks(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
    let Some(project_id) = params.get("project").and_then(|v| Uuid::parse_str(v).ok()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "missing or invalid ?project=" }))).into_response();
    };
    let tasks = match state.tasks.list_tasks(project_id).await {
        Ok(tasks) => tasks,
        Err(err) => return error_response(err),
    };
    let graph = Graph::from_tasks(&tasks);
    Json(graph.ready_tasks(None)).into_response()
}

async fn project_dependency_graph(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
    let Some(project_id) = params.get("project").and_then(|v| Uuid::parse_str(v).ok()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "missing or invalid ?project=" }))).into_response();
    };
    let tasks = match state.tasks.list_tasks(project_id).await {
        Ok(tasks) => tasks,
        Err(err) => return error_response(err),
    };
    let graph = Graph::from_tasks(&tasks);
    let levels = match graph.execution_levels() {
        Ok(levels) => levels,
        Err(_) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": "dependency cycle detected", "has_cycles": true }))).into_response(),
    };
    Json(json!({
        "execution_levels": levels,
        "critical_path": graph.critical_path(),
        "has_cycles": false,
    }))
    .into_response()
}
