//! Core domain types: tasks, attempts, projects, and the dependency graph.

pub mod attempt;
pub mod dag;
pub mod project;
pub mod task;

pub use attempt::{Attempt, AttemptEvent, AttemptStatus, EventKind, GateKind, GateResult, GateStatus};
pub use dag::{BlockReason, BlockedTask, Graph, GraphError, StartCheck};
pub use project::{Project, ProjectConfig};
pub use task::{AgentRole, Task, TaskStatus};
