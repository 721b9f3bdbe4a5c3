//! Application services: the event bus and the three orchestration
//! components layered on top of the domain model and ports.

pub mod attempt_runner;
pub mod event_bus;
pub mod execution_coordinator;
pub mod review_gate;

pub use attempt_runner::AttemptRunner;
pub use event_bus::EventBus;
pub use execution_coordinator::ExecutionCoordinator;
pub use review_gate::ReviewGateController;
