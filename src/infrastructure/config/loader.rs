//! Loads and validates [`Config`] via `figment`.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use super::model::Config;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to extract configuration: {0}")]
    Extraction(#[from] figment::Error),
    #[error("max_concurrent must be between 0 and 64, got {0}")]
    InvalidMaxConcurrent(u32),
    #[error("database path must not be empty")]
    EmptyDatabasePath,
    #[error("database.max_connections must be at least 1")]
    InvalidMaxConnections,
    #[error("logging.level must be one of trace/debug/info/warn/error, got {0}")]
    InvalidLogLevel(String),
    #[error("logging.format must be one of pretty/json, got {0}")]
    InvalidLogFormat(String),
    #[error("worker.shared_secret must not be empty when worker.base_url is not a loopback address")]
    MissingWorkerSecret,
}

/// Builds a [`Config`] from defaults, config files, and environment
/// variables, validating the result before returning it.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration in precedence order: built-in defaults,
    /// `.orchestrator/config.yaml`, `.orchestrator/local.yaml`, then
    /// `ORCHESTRATOR_`-prefixed environment variables (`__` splits nested
    /// keys, e.g. `ORCHESTRATOR_DATABASE__PATH`).
    pub fn load() -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".orchestrator/config.yaml"))
            .merge(Yaml::file(".orchestrator/local.yaml"))
            .merge(Env::prefixed("ORCHESTRATOR_").split("__"))
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.max_concurrent > 64 {
            return Err(ConfigError::InvalidMaxConcurrent(config.max_concurrent));
        }
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections < 1 {
            return Err(ConfigError::InvalidMaxConnections);
        }
        if !["trace", "debug", "info", "warn", "error"].contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        if !["pretty", "json"].contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let is_loopback = config.worker.base_url.contains("127.0.0.1") || config.worker.base_url.contains("localhost");
        if !is_loopback && config.worker.shared_secret.trim().is_empty() {
            return Err(ConfigError::MissingWorkerSecret);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ConfigLoader::validate(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_oversized_concurrency_cap() {
        let mut config = Config::default();
        config.max_concurrent = 100;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxConcurrent(100))));
    }

    #[test]
    fn rejects_non_loopback_worker_without_secret() {
        let mut config = Config::default();
        config.worker.base_url = "https://worker.example.com".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::MissingWorkerSecret)));
    }

    #[test]
    fn env_var_overrides_default_max_concurrent() {
        temp_env::with_var("ORCHESTRATOR_MAX_CONCURRENT", Some("10"), || {
            let config = ConfigLoader::load().expect("load with env override");
            assert_eq!(config.max_concurrent, 10);
        });
    }

    #[test]
    fn nested_env_var_overrides_database_path() {
        temp_env::with_var("ORCHESTRATOR_DATABASE__PATH", Some("/tmp/swarmctl-test.db"), || {
            let config = ConfigLoader::load().expect("load with nested env override");
            assert_eq!(config.database.path, "/tmp/swarmctl-test.db");
        });
    }
}
