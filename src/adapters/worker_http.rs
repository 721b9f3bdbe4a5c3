//! Signed-HTTP [`WorkerClient`] adapter (C9): the Orchestrator's side of the
//! Execution Worker RPC contract.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::worker_client::{
    CleanupRequest, CleanupResponse, MergeBranchRequest, MergeBranchResponse, RunAgentRequest, RunAgentResponse, WorkerClient,
};

type HmacSha256 = Hmac<Sha256>;

const RUN_AGENT_TIMEOUT: Duration = Duration::from_secs(600);
const MERGE_BRANCH_TIMEOUT: Duration = Duration::from_secs(60);
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Signs a request body with `HMAC-SHA256(secret, timestamp || body)`,
/// matching the Worker's verification scheme.
fn compute_signature(secret: &str, timestamp: &str, body: &str) -> DomainResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| DomainError::Transport(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `reqwest`-backed implementation of [`WorkerClient`].
pub struct HttpWorkerClient {
    client: Client,
    base_url: String,
    shared_secret: String,
}

impl HttpWorkerClient {
    pub fn new(base_url: impl Into<String>, shared_secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            shared_secret: shared_secret.into(),
        }
    }

    async fn post_signed<Req: Serialize, Res: serde::de::DeserializeOwned>(&self, path: &str, body: &Req, timeout: Duration) -> DomainResult<Res> {
        let payload = serde_json::to_string(body)?;
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|e| DomainError::Transport(e.to_string()))?.as_secs().to_string();
        let signature = compute_signature(&self.shared_secret, &timestamp, &payload)?;

        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .header("Content-Type", "application/json")
            .header("X-Timestamp", timestamp)
            .header("X-Signature", signature)
            .body(payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DomainError::WorkerReported(format!("worker returned {status}: {text}")));
        }

        response.json::<Res>().await.map_err(|e| DomainError::Transport(e.to_string()))
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn run_agent(&self, request: RunAgentRequest) -> DomainResult<RunAgentResponse> {
        self.post_signed("run_agent", &request, RUN_AGENT_TIMEOUT).await
    }

    async fn merge_branch(&self, request: MergeBranchRequest) -> DomainResult<MergeBranchResponse> {
        self.post_signed("merge_branch", &request, MERGE_BRANCH_TIMEOUT).await
    }

    async fn cleanup(&self, request: CleanupRequest) -> DomainResult<CleanupResponse> {
        self.post_signed("cleanup", &request, CLEANUP_TIMEOUT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentRole;
    use crate::domain::ports::worker_client::{RunAgentProject, RunAgentTask};
    use uuid::Uuid;

    #[test]
    fn signature_is_deterministic_for_same_inputs() {
        let a = compute_signature("secret", "1000", "{}").unwrap();
        let b = compute_signature("secret", "1000", "{}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn signature_changes_with_body() {
        let a = compute_signature("secret", "1000", "{}").unwrap();
        let b = compute_signature("secret", "1000", "{\"x\":1}").unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn run_agent_sends_signature_headers_and_decodes_response() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "success": true,
            "git_branch": "agent-backend-abcd1234",
            "worktree_path": "/tmp/work",
            "diff": null,
            "files_changed": [],
            "output": "done",
            "error": null,
            "gate_results": [],
        });
        let mock = server
            .mock("POST", "/run_agent")
            .match_header("x-signature", mockito::Matcher::Any)
            .match_header("x-timestamp", mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = HttpWorkerClient::new(server.url(), "shared-secret");
        let request = RunAgentRequest {
            attempt_id: Uuid::new_v4(),
            task: RunAgentTask {
                id: Uuid::new_v4(),
                title: "t".to_string(),
                description: "d".to_string(),
                agent_role: AgentRole::Backend,
                acceptance_criteria: vec![],
            },
            project: RunAgentProject {
                name: "demo".to_string(),
                description: "d".to_string(),
                repo_path: "/tmp/demo".to_string(),
                config: std::collections::HashMap::new(),
            },
            writable_roots: vec!["/tmp/demo".to_string()],
            model: "default".to_string(),
        };

        let response = client.run_agent(request).await.unwrap();
        assert!(response.success);
        assert_eq!(response.git_branch.as_deref(), Some("agent-backend-abcd1234"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn run_agent_surfaces_non_success_status_as_worker_reported_not_transport() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", "/run_agent").with_status(500).with_body("internal error").create_async().await;

        let client = HttpWorkerClient::new(server.url(), "shared-secret");
        let request = RunAgentRequest {
            attempt_id: Uuid::new_v4(),
            task: RunAgentTask {
                id: Uuid::new_v4(),
                title: "t".to_string(),
                description: "d".to_string(),
                agent_role: AgentRole::Backend,
                acceptance_criteria: vec![],
            },
            project: RunAgentProject {
                name: "demo".to_string(),
                description: "d".to_string(),
                repo_path: "/tmp/demo".to_string(),
                config: std::collections::HashMap::new(),
            },
            writable_roots: vec![],
            model: "default".to_string(),
        };

        let err = client.run_agent(request).await.unwrap_err();
        assert!(matches!(err, DomainError::WorkerReported(_)));
    }
}
