//! Typed error taxonomy shared by every port and service.

use uuid::Uuid;

/// Errors produced by the domain and its repositories.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("project {0} not found")]
    ProjectNotFound(Uuid),

    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    #[error("attempt {0} not found")]
    AttemptNotFound(Uuid),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("dependency cycle detected involving task {0}")]
    CycleDetected(Uuid),

    #[error("task {task} is missing dependency {dependency}")]
    MissingDependency { task: Uuid, dependency: Uuid },

    #[error("task {0} has unmet dependencies: {1:?}")]
    DependencyUnmet(Uuid, Vec<Uuid>),

    #[error("worker transport error: {0}")]
    Transport(String),

    #[error("worker reported failure: {0}")]
    WorkerReported(String),

    #[error("merge conflict on branch {0}")]
    MergeConflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

/// Convenience alias used throughout the domain and adapter layers.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
