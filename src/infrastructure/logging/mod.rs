//! Structured logging setup (`tracing` + `tracing-subscriber` +
//! `tracing-appender`).

mod logger;

pub use logger::{init_logging, LoggingGuard};
