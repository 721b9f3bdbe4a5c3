//! Initializes the global `tracing` subscriber from [`crate::infrastructure::config::LoggingConfig`].

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::infrastructure::config::LoggingConfig;

/// Keeps the non-blocking file appender's worker thread alive; hold this
/// for the lifetime of the process.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Installs the global subscriber: JSON or pretty formatting to stdout per
/// `config.format`, filtered by `config.level` unless overridden by
/// `RUST_LOG`, plus a daily-rolling file appender under `log_dir`.
pub fn init_logging(config: &LoggingConfig, log_dir: &str) -> LoggingGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_appender = tracing_appender::rolling::daily(log_dir, "orchestrator.log");
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false).json();

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }

    LoggingGuard { _file_guard: Some(file_guard) }
}
