//! Shared fixtures for integration tests: an in-memory SQLite pool and a
//! scriptable mock [`WorkerClient`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use swarmctl::adapters::sqlite::Migrator;
use swarmctl::domain::errors::{DomainError, DomainResult};
use swarmctl::domain::ports::worker_client::{
    CleanupRequest, CleanupResponse, MergeBranchRequest, MergeBranchResponse, RunAgentRequest, RunAgentResponse, WorkerClient,
};

pub async fn in_memory_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:").await.expect("open in-memory sqlite");
    Migrator::new(pool.clone()).run_embedded_migrations().await.expect("run migrations");
    pool
}

/// A scripted worker: `run_agent` always succeeds unless the attempt_id is
/// registered in `failures`, in which case it returns a worker-reported
/// failure (not a transport error).
pub struct MockWorkerClient {
    pub failures: Mutex<HashMap<Uuid, String>>,
    pub transport_failures: Mutex<HashMap<Uuid, u32>>,
}

impl Default for MockWorkerClient {
    fn default() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            transport_failures: Mutex::new(HashMap::new()),
        }
    }
}

impl MockWorkerClient {
    pub fn fail_with(&self, attempt_id: Uuid, message: impl Into<String>) {
        self.failures.lock().unwrap().insert(attempt_id, message.into());
    }

    pub fn always_transport_fail(&self, attempt_id: Uuid) {
        self.transport_failures.lock().unwrap().insert(attempt_id, u32::MAX);
    }
}

#[async_trait]
impl WorkerClient for MockWorkerClient {
    async fn run_agent(&self, request: RunAgentRequest) -> DomainResult<RunAgentResponse> {
        if self.transport_failures.lock().unwrap().contains_key(&request.attempt_id) {
            return Err(DomainError::Transport("connection refused".to_string()));
        }
        if let Some(message) = self.failures.lock().unwrap().get(&request.attempt_id) {
            return Ok(RunAgentResponse {
                success: false,
                git_branch: None,
                worktree_path: None,
                diff: None,
                files_changed: vec![],
                output: None,
                error: Some(message.clone()),
                gate_results: vec![],
            });
        }
        Ok(RunAgentResponse {
            success: true,
            git_branch: Some(format!("agent-backend-{}", &request.attempt_id.simple().to_string()[..8])),
            worktree_path: Some("/tmp/work".to_string()),
            diff: Some("diff --git a/x b/x".to_string()),
            files_changed: vec!["x".to_string()],
            output: Some("done".to_string()),
            error: None,
            gate_results: vec![],
        })
    }

    async fn merge_branch(&self, _request: MergeBranchRequest) -> DomainResult<MergeBranchResponse> {
        Ok(MergeBranchResponse {
            success: true,
            conflict: false,
            message: Some("merged".to_string()),
            error: None,
        })
    }

    async fn cleanup(&self, _request: CleanupRequest) -> DomainResult<CleanupResponse> {
        Ok(CleanupResponse { success: true, error: None })
    }
}
