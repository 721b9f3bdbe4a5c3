//! Multi-agent task DAG orchestrator: dependency graph queries, a
//! review-gated attempt lifecycle, and bounded-parallel execution
//! coordination over an external worker.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod http;
pub mod infrastructure;
pub mod services;
