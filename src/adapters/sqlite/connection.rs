//! SQLite connection pool setup.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

/// Errors establishing the connection pool.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid database path: {0}")]
    InvalidPath(String),
    #[error("pool error: {0}")]
    Pool(#[from] sqlx::Error),
}

/// Pool sizing/timeout knobs, mirroring the defaults used elsewhere in the
/// ambient configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(3),
        }
    }
}

/// Opens a WAL-mode SQLite pool at `database_path`, creating the file if
/// absent, with foreign keys enforced and a generous busy timeout so
/// concurrent writers back off instead of erroring immediately.
pub async fn create_pool(database_path: &str, config: &PoolConfig) -> Result<SqlitePool, ConnectionError> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{database_path}"))
        .map_err(|e| ConnectionError::InvalidPath(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_file_backed_pool_with_wal_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swarmctl.db");
        let pool = create_pool(path.to_str().unwrap(), &PoolConfig::default()).await.unwrap();

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(&pool).await.unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn rejects_unopenable_path() {
        let err = create_pool("/nonexistent/deeply/nested/path/db.sqlite", &PoolConfig::default()).await;
        assert!(err.is_err());
    }
}
