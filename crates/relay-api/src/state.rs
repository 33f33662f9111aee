//! Application state shared across all route handlers.
//!
//! AppState holds references to the dispatch engine components and shared
//! resources. It is passed to handlers via axum's State extractor.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use uuid::Uuid;

use relay_actions::{RequestCoordinator, WebhookRouter};
use relay_core::config::RelayConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Mutex<RelayConfig>>,
    /// Action dispatch and approval façade.
    pub coordinator: Arc<RequestCoordinator>,
    /// Webhook routing and validation.
    pub webhooks: Arc<WebhookRouter>,
    /// Bearer token protecting the API surface.
    pub api_token: String,
    /// Unique ID for this server instance, used in logs and status output.
    pub server_id: Uuid,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with the given components.
    pub fn new(
        config: RelayConfig,
        coordinator: Arc<RequestCoordinator>,
        webhooks: Arc<WebhookRouter>,
    ) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            coordinator,
            webhooks,
            api_token: String::new(),
            server_id: Uuid::new_v4(),
            start_time: Instant::now(),
        }
    }
}
