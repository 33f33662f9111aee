//! HTTP transport for the Relay dispatch engine.
//!
//! Thin axum wrapper over the `relay-actions` contracts: routing, auth,
//! rate limiting, and JSON envelope shaping live here; all dispatch
//! semantics live in the engine.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use routes::{create_router, start_server};
pub use state::AppState;
