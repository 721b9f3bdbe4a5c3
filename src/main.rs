//! Binary entry point: loads configuration, wires the services together,
//! and either serves the HTTP surface or runs a single CLI command.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use swarmctl::adapters::sqlite::{create_pool, Migrator, PoolConfig, SqliteAttemptRepository, SqliteTaskRepository};
use swarmctl::adapters::HttpWorkerClient;
use swarmctl::cli::commands::{self, CommandContext};
use swarmctl::cli::{Cli, Command};
use swarmctl::http::{build_router, AppState};
use swarmctl::infrastructure::config::ConfigLoader;
use swarmctl::infrastructure::logging::init_logging;
use swarmctl::services::{AttemptRunner, EventBus, ExecutionCoordinator, ReviewGateController};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load()?;
    let _logging_guard = init_logging(&config.logging, ".orchestrator/logs");

    let pool = create_pool(
        &config.database.path,
        &PoolConfig {
            max_connections: config.database.max_connections,
            ..Default::default()
        },
    )
    .await?;
    Migrator::new(pool.clone()).run_embedded_migrations().await?;

    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let attempts = Arc::new(SqliteAttemptRepository::new(pool));
    let worker = Arc::new(HttpWorkerClient::new(config.worker.base_url.clone(), config.worker.shared_secret.clone()));
    let bus = EventBus::new();

    let runner = Arc::new(AttemptRunner::new(attempts.clone(), tasks.clone(), worker.clone(), bus.clone()));
    let coordinator = Arc::new(ExecutionCoordinator::new(
        tasks.clone(),
        attempts.clone(),
        runner,
        bus.clone(),
        config.max_concurrent as usize,
    ));
    let review_gate = Arc::new(ReviewGateController::new(attempts, tasks.clone(), worker, coordinator.clone()));

    match cli.command {
        Command::Serve => {
            let state = AppState {
                tasks,
                coordinator,
                review_gate,
                bus,
            };
            let router = build_router(state);
            let addr = format!("{}:{}", config.http.host, config.http.port);
            tracing::info!(%addr, "starting orchestrator http surface");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, router).await?;
        }
        other => {
            let ctx = CommandContext { coordinator, review_gate };
            match other {
                Command::Schedule { project_id } => commands::schedule(&ctx, project_id).await?,
                Command::Status { project_id } => commands::status(&ctx, project_id).await?,
                Command::CancelAll { project_id } => commands::cancel_all(&ctx, project_id).await?,
                Command::RetryFailed { project_id } => commands::retry_failed(&ctx, project_id).await?,
                Command::Approve { attempt_id } => commands::approve(&ctx, attempt_id).await?,
                Command::Reject { attempt_id, feedback } => commands::reject(&ctx, attempt_id, feedback).await?,
                Command::Cancel { attempt_id } => commands::cancel(&ctx, attempt_id).await?,
                Command::Serve => unreachable!(),
            }
        }
    }

    Ok(())
}
