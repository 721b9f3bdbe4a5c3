//! Command-line surface: `clap`-derived subcommands over the same
//! services the HTTP surface exposes.

pub mod commands;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Multi-agent task DAG orchestrator.
#[derive(Debug, Parser)]
#[command(name = "swarmctl", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP/WS orchestrator surface.
    Serve,
    /// Dispatch as many ready tasks as there are free concurrency slots.
    Schedule { project_id: Uuid },
    /// Print a point-in-time execution status summary for a project.
    Status { project_id: Uuid },
    /// Cancel every running attempt in a project.
    CancelAll { project_id: Uuid },
    /// Reset every failed task to `todo` and reschedule.
    RetryFailed { project_id: Uuid },
    /// Approve a successful attempt: merges its branch and cascades scheduling.
    Approve { attempt_id: Uuid },
    /// Reject an attempt, resetting its task to `todo`.
    Reject {
        attempt_id: Uuid,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Cancel a pending, queued, or running attempt.
    Cancel { attempt_id: Uuid },
}
