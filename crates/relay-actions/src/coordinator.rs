//! Request coordinator.
//!
//! The façade the transport layer talks to: given an action name and
//! parameters, either executes immediately through the registry or parks the
//! request behind an approval gate, and later applies the human decision.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use relay_core::types::Timestamp;

use crate::approval::ApprovalCoordinator;
use crate::error::DispatchError;
use crate::registry::{ActionHandler, ActionRegistry};
use crate::types::{
    ActionMetadata, ActionParams, ActiveRequest, ApprovalOutcome, DispatchOutcome, RequestState,
    ResolutionOutcome,
};

/// Coordinates approval checks, execution, and request correlation.
pub struct RequestCoordinator {
    registry: Arc<ActionRegistry>,
    approvals: Arc<ApprovalCoordinator>,
    active: Mutex<HashMap<String, ActiveRequest>>,
}

impl RequestCoordinator {
    pub fn new(registry: Arc<ActionRegistry>, approvals: Arc<ApprovalCoordinator>) -> Self {
        Self {
            registry,
            approvals,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn approvals(&self) -> &Arc<ApprovalCoordinator> {
        &self.approvals
    }

    /// Register an action and wire up its approval requirement in one step.
    pub fn register(
        &self,
        name: &str,
        handler: Arc<dyn ActionHandler>,
        metadata: ActionMetadata,
    ) {
        let requires_approval = metadata.requires_approval;
        self.registry.register(name, handler, metadata);
        if requires_approval {
            self.approvals.require_approval(name);
        } else {
            // Re-registration may flip the flag off.
            self.approvals.clear_approval_requirement(name);
        }
    }

    /// Handle an inbound trigger.
    ///
    /// Approval-gated actions are parked, not executed; everything else runs
    /// through the registry immediately. The correlated ActiveRequest record
    /// tracks progress either way.
    pub async fn handle(
        &self,
        action_name: &str,
        params: ActionParams,
        request_id: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        info!(request_id = %request_id, action = %action_name, "Processing request");
        self.track(request_id, action_name, &params, RequestState::Processing);

        if self.approvals.requires_approval(action_name) {
            let request = self.approvals.create_request(
                request_id.to_string(),
                action_name.to_string(),
                params,
                None,
            );
            self.transition(request_id, RequestState::AwaitingApproval);
            return Ok(DispatchOutcome::AwaitingApproval {
                approval_path: format!("/api/approvals/{}", request.request_id),
                request_id: request.request_id,
            });
        }

        match self.registry.execute(action_name, &params).await {
            Ok(result) => {
                self.transition(request_id, RequestState::Completed);
                Ok(DispatchOutcome::Completed { result })
            }
            Err(e) => {
                self.transition(request_id, RequestState::Error);
                Err(e.into())
            }
        }
    }

    /// Apply a human decision to a parked request.
    ///
    /// Approval hands the original name and parameters back from the
    /// coordinator, and execution still goes through the registry's single
    /// code path. Rejection and expiry are terminal and never execute.
    pub async fn resolve_approval(
        &self,
        request_id: &str,
        approved: bool,
        comments: &str,
        approver: &str,
    ) -> Result<ResolutionOutcome, DispatchError> {
        match self
            .approvals
            .resolve(request_id, approved, comments, approver)?
        {
            ApprovalOutcome::Approved {
                action_name,
                params,
                approver,
            } => match self.registry.execute(&action_name, &params).await {
                Ok(result) => {
                    self.transition(request_id, RequestState::Completed);
                    Ok(ResolutionOutcome::Executed { result, approver })
                }
                Err(e) => {
                    self.transition(request_id, RequestState::Error);
                    Err(e.into())
                }
            },
            ApprovalOutcome::Rejected => {
                self.transition(request_id, RequestState::Rejected);
                Ok(ResolutionOutcome::Rejected)
            }
            ApprovalOutcome::Expired => {
                self.transition(request_id, RequestState::Expired);
                Ok(ResolutionOutcome::Expired)
            }
        }
    }

    /// Diagnostic snapshot of request correlation records, oldest first.
    pub fn active_requests(&self) -> Vec<ActiveRequest> {
        let active = self.active.lock().unwrap();
        let mut requests: Vec<ActiveRequest> = active.values().cloned().collect();
        requests.sort_by_key(|r| (r.updated_at, r.request_id.clone()));
        requests
    }

    fn track(
        &self,
        request_id: &str,
        action_name: &str,
        params: &ActionParams,
        state: RequestState,
    ) {
        self.active.lock().unwrap().insert(
            request_id.to_string(),
            ActiveRequest {
                request_id: request_id.to_string(),
                action_name: action_name.to_string(),
                params: params.clone(),
                state,
                updated_at: Timestamp::now(),
            },
        );
    }

    fn transition(&self, request_id: &str, state: RequestState) {
        if let Some(record) = self.active.lock().unwrap().get_mut(request_id) {
            record.state = state;
            record.updated_at = Timestamp::now();
        }
    }
}
