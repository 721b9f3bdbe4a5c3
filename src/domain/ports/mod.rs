//! Trait boundaries (ports) implemented by adapters.

pub mod attempt_repository;
pub mod task_repository;
pub mod worker_client;

pub use attempt_repository::AttemptRepository;
pub use task_repository::TaskRepository;
pub use worker_client::WorkerClient;
