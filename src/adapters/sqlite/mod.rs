//! SQLite persistence adapter (C3, C7).

pub mod attempt_repository;
pub mod connection;
pub mod migrations;
pub mod task_repository;

pub use attempt_repository::SqliteAttemptRepository;
pub use connection::{create_pool, ConnectionError, PoolConfig};
pub use migrations::Migrator;
pub use task_repository::SqliteTaskRepository;
