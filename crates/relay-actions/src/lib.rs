//! Dispatch engine for Relay.
//!
//! Maps named actions to handlers, gates sensitive actions behind
//! human-in-the-loop approval, and routes inbound webhooks to actions.

pub mod approval;
pub mod coordinator;
pub mod error;
pub mod handler;
pub mod registry;
pub mod sweeper;
pub mod types;
pub mod webhook;

pub use approval::{ApprovalCoordinator, ApprovalNotifier};
pub use coordinator::RequestCoordinator;
pub use error::{ActionError, ApprovalError, DispatchError, WebhookError};
pub use registry::{ActionHandler, ActionRegistry};
pub use sweeper::ExpirationSweeper;
pub use types::{
    ActionMetadata, ActionParams, ActionSummary, ActiveRequest, ApprovalOutcome, ApprovalRequest,
    ApprovalStats, ApprovalStatus, DispatchOutcome, RegistryStats, RequestState, ResolutionOutcome,
};
pub use webhook::{WebhookReceipt, WebhookRouter, TASK_BOARD_TYPE};
