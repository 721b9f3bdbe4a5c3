//! Embedded, versioned SQL migrations, tracked in a `schema_migrations`
//! table.

use sqlx::SqlitePool;

/// Errors running a migration.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("migration {version} failed: {source}")]
    ExecutionError { version: i64, source: sqlx::Error },
    #[error("could not read current schema version: {0}")]
    VersionCheckError(sqlx::Error),
}

/// One embedded migration.
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

fn all_embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "initial schema: projects, tasks, dependencies, attempts, events, gate results",
        sql: include_str!("../../../migrations/001_initial_schema.sql"),
    }]
}

/// Applies embedded migrations against `pool`, in order, skipping any
/// version already recorded in `schema_migrations`.
pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_embedded_migrations(&self) -> Result<(), MigrationError> {
        self.ensure_migrations_table().await?;
        let current = self.get_current_version().await?;
        for migration in all_embedded_migrations() {
            if migration.version > current {
                self.apply_migration(&migration).await?;
            }
        }
        Ok(())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(MigrationError::VersionCheckError)?;
        Ok(())
    }

    async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(version) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::VersionCheckError)?;
        Ok(row.0.unwrap_or(0))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        sqlx::raw_sql(migration.sql)
            .execute(&self.pool)
            .await
            .map_err(|source| MigrationError::ExecutionError { version: migration.version, source })?;
        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&self.pool)
            .await
            .map_err(|source| MigrationError::ExecutionError { version: migration.version, source })?;
        Ok(())
    }
}
