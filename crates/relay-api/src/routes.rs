//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with tracing, rate limiting, body limits,
//! and bearer-token auth on everything except the health check.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Routes that do NOT require authentication.
    let public_routes = Router::new().route("/health", get(handlers::health));

    // Rate limiter: 100 requests per second.
    let limiter = RateLimiter::new(100);

    let protected_routes = Router::new()
        .route("/api/actions", get(handlers::list_actions))
        .route("/api/actions/{name}", post(handlers::handle_action))
        .route("/api/approvals", get(handlers::pending_approvals))
        .route("/api/approvals/history", get(handlers::approval_history))
        .route(
            "/api/approvals/{request_id}",
            post(handlers::resolve_approval),
        )
        .route("/api/status", get(handlers::status))
        .route(
            "/api/webhooks/task-board",
            post(handlers::task_board_webhook),
        )
        .route(
            "/api/webhooks/{webhook_type}",
            post(handlers::generic_webhook),
        )
        .layer(axum::middleware::from_fn(
            crate::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::Extension(limiter))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB global limit
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Binds to 127.0.0.1 (localhost only) on the port from config.
pub async fn start_server(state: AppState) -> Result<(), relay_core::error::RelayError> {
    let port = state
        .config
        .lock()
        .map(|c| c.general.port)
        .unwrap_or(8080);
    let addr = format!("127.0.0.1:{}", port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| relay_core::error::RelayError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| relay_core::error::RelayError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
