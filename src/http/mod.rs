//! Thin `axum` surface (C8) exposing the orchestration endpoints. Handlers
//! are pass-throughs to C1/C5/C6; no orchestration logic lives here.

mod routes;
mod ws;

pub use routes::{build_router, AppState};
