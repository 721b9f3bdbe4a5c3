//! Hierarchical configuration (figment-based), validated on load.

mod loader;
mod model;

pub use loader::{ConfigError, ConfigLoader};
pub use model::{Config, DatabaseConfig, HttpConfig, LoggingConfig, WorkerConfig};
