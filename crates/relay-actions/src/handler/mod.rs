//! Built-in action handlers.
//!
//! Each handler implements `ActionHandler` for one named action; the
//! composition root registers them through `register_defaults`.

pub mod account_graph;
pub mod client_profile;
pub mod session_update;
pub mod webhook_ingest;
pub mod webhook_reply;

use std::sync::Arc;

use crate::coordinator::RequestCoordinator;
use crate::types::ActionMetadata;

/// Register the full built-in action set with its approval wiring.
pub fn register_defaults(coordinator: &RequestCoordinator) {
    coordinator.register(
        "client_profile",
        Arc::new(client_profile::ClientProfileHandler),
        ActionMetadata::new("Retrieve client session metadata", false),
    );
    coordinator.register(
        "session_update",
        Arc::new(session_update::SessionUpdateHandler),
        ActionMetadata::new("Update client session information", true),
    );
    coordinator.register(
        "webhook_ingest",
        Arc::new(webhook_ingest::WebhookIngestHandler),
        ActionMetadata::new("Normalize an inbound webhook payload", false),
    );
    coordinator.register(
        "account_graph",
        Arc::new(account_graph::AccountGraphHandler),
        ActionMetadata::new("Extract an account graph from a task payload", false),
    );
    coordinator.register(
        "webhook_reply",
        Arc::new(webhook_reply::WebhookReplyHandler::new()),
        ActionMetadata::new("Send a response payload to an external webhook", true),
    );
}
