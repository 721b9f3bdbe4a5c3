//! Project: the scope boundary that owns a task DAG.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form per-project settings (`install_cmd`, `test_cmd`, `lint_cmd`,
/// `build_cmd`, ...) forwarded to the Worker on every `run_agent` call so it
/// knows how to build/lint/test this particular repository.
pub type ProjectConfig = HashMap<String, serde_json::Value>;

/// A registered software project: a local repository plus an owning principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub repo_path: String,
    pub owner_id: Uuid,
    pub config: ProjectConfig,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, description: impl Into<String>, repo_path: impl Into<String>, owner_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            repo_path: repo_path.into(),
            owner_id,
            config: ProjectConfig::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_config(mut self, config: ProjectConfig) -> Self {
        self.config = config;
        self
    }
}
