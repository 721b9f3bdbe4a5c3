//! Concrete implementations of the domain ports.

pub mod sqlite;
pub mod worker_http;

pub use worker_http::HttpWorkerClient;
