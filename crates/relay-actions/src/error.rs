//! Error types for the dispatch engine.

use uuid::Uuid;

/// Errors from action registration and execution.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Action '{0}' is not registered")]
    NotFound(String),
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("Action handler failed: {0}")]
    Failed(String),
    /// A handler failure wrapped with its action name and measured duration.
    #[error("Action '{action}' failed after {elapsed_ms} ms: {source}")]
    Handler {
        action: String,
        elapsed_ms: u64,
        #[source]
        source: Box<ActionError>,
    },
}

/// Errors from the approval workflow.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("Approval request '{0}' not found")]
    NotFound(String),
    #[error("Approval notification failed: {0}")]
    Notify(String),
}

/// Combined failure surface of the request coordinator.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

/// Errors from webhook routing and validation.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook payload invalid: {0}")]
    Validation(String),
    #[error("Webhook signature rejected: {0}")]
    Signature(String),
    /// A downstream action failure, tagged with the webhook correlation ID.
    #[error("Webhook {webhook_id} dispatch failed: {source}")]
    Dispatch {
        webhook_id: Uuid,
        #[source]
        source: DispatchError,
    },
}
