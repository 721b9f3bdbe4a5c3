//! Port for the external Execution Worker RPC contract (C9, spec section 6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentRole, GateKind, GateStatus, ProjectConfig};

/// Task fields sent to the worker as part of `run_agent`.
#[derive(Debug, Clone, Serialize)]
#[allow(clippy::struct_field_names)]
pub struct RunAgentTask {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub agent_role: AgentRole,
    pub acceptance_criteria: Vec<String>,
}

/// Project fields sent to the worker as part of `run_agent`.
#[derive(Debug, Clone, Serialize)]
pub struct RunAgentProject {
    pub name: String,
    pub description: String,
    pub repo_path: String,
    pub config: ProjectConfig,
}

/// Request body for the `run_agent` worker endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RunAgentRequest {
    pub attempt_id: Uuid,
    pub task: RunAgentTask,
    pub project: RunAgentProject,
    pub writable_roots: Vec<String>,
    pub model: String,
}

/// One gate outcome as reported by the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerGateResult {
    pub kind: GateKind,
    pub status: GateStatus,
    pub output: String,
    pub duration_secs: f64,
}

/// Response body for the `run_agent` worker endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RunAgentResponse {
    pub success: bool,
    pub git_branch: Option<String>,
    pub worktree_path: Option<String>,
    pub diff: Option<String>,
    #[serde(default)]
    pub files_changed: Vec<String>,
    pub output: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub gate_results: Vec<WorkerGateResult>,
}

/// Request body for `merge_branch`.
#[derive(Debug, Clone, Serialize)]
pub struct MergeBranchRequest {
    pub repo_path: String,
    pub branch_name: String,
    pub target_branch: String,
}

/// Response body for `merge_branch`. A conflict is reported as
/// `success = false` with `conflict = true`; any other failure leaves
/// `conflict = false` so callers can distinguish transport-worthy retry
/// conditions from a genuine merge conflict.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeBranchResponse {
    pub success: bool,
    #[serde(default)]
    pub conflict: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Request body for `cleanup`.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupRequest {
    pub repo_path: String,
    pub worktree_path_or_branch: String,
}

/// Response body for `cleanup`.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub error: Option<String>,
}

/// The signed-HTTP boundary to the external Execution Worker.
///
/// Implementors are expected to sign every request per the HMAC scheme in
/// section 6 and enforce the timeouts from section 5 (10 min / 60 s / 30 s).
/// [`crate::domain::errors::DomainError::Transport`] must be returned for
/// connectivity failures so the attempt runner's retry policy applies;
/// [`crate::domain::errors::DomainError::WorkerReported`] for a reachable
/// worker that declined the work.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn run_agent(&self, request: RunAgentRequest) -> DomainResult<RunAgentResponse>;
    async fn merge_branch(&self, request: MergeBranchRequest) -> DomainResult<MergeBranchResponse>;
    async fn cleanup(&self, request: CleanupRequest) -> DomainResult<CleanupResponse>;
}
