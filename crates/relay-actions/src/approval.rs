//! Human-in-the-loop approval workflow.
//!
//! Tracks which actions require approval, parks their requests until a
//! decision arrives, and reconciles requests that outlive their timeout.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use relay_core::types::Timestamp;

use crate::error::ApprovalError;
use crate::types::{
    ActionParams, ApprovalOutcome, ApprovalRequest, ApprovalStats, ApprovalStatus,
};

/// Hook for pushing newly created approval requests to external systems
/// (chat channels, ticketing, pagers). Notification is best-effort.
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    async fn notify(&self, request: &ApprovalRequest) -> Result<(), ApprovalError>;
}

#[derive(Default)]
struct ApprovalLedger {
    pending: HashMap<String, ApprovalRequest>,
    history: Vec<ApprovalRequest>,
}

/// Coordinator owning the approval-request state machine.
///
/// A request transitions `pending -> {approved, rejected, expired}` exactly
/// once; resolved requests move into the append-only history and are never
/// mutated again. The ledger sits behind one mutex, so of two concurrent
/// resolvers only the first can succeed — the second observes `NotFound`.
pub struct ApprovalCoordinator {
    timeout: Duration,
    ledger: Mutex<ApprovalLedger>,
    required: Mutex<HashSet<String>>,
    notifiers: Mutex<Vec<Arc<dyn ApprovalNotifier>>>,
}

impl ApprovalCoordinator {
    /// Create a coordinator whose requests expire `timeout` after creation.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ledger: Mutex::new(ApprovalLedger::default()),
            required: Mutex::new(HashSet::new()),
            notifiers: Mutex::new(Vec::new()),
        }
    }

    /// Mark an action as approval-gated. Idempotent.
    pub fn require_approval(&self, action_name: &str) {
        if self.required.lock().unwrap().insert(action_name.to_string()) {
            info!(action = %action_name, "Added approval requirement");
        }
    }

    /// Remove an action from the approval-gated set. Idempotent.
    pub fn clear_approval_requirement(&self, action_name: &str) {
        if self.required.lock().unwrap().remove(action_name) {
            info!(action = %action_name, "Removed approval requirement");
        }
    }

    pub fn requires_approval(&self, action_name: &str) -> bool {
        self.required.lock().unwrap().contains(action_name)
    }

    /// Register an external notifier invoked for every new request.
    pub fn add_notifier(&self, notifier: Arc<dyn ApprovalNotifier>) {
        self.notifiers.lock().unwrap().push(notifier);
    }

    /// Park a request as pending and fan out to notifiers.
    ///
    /// Notification runs on detached tasks: a slow or failing notifier is
    /// logged and never affects the request's own creation.
    pub fn create_request(
        &self,
        request_id: impl Into<String>,
        action_name: impl Into<String>,
        params: ActionParams,
        approver: Option<String>,
    ) -> ApprovalRequest {
        let now = Timestamp::now();
        let request = ApprovalRequest {
            request_id: request_id.into(),
            action_name: action_name.into(),
            params,
            status: ApprovalStatus::Pending,
            created_at: now,
            expires_at: Timestamp(now.0 + self.timeout.as_secs() as i64),
            approver,
            comments: None,
            resolved_at: None,
        };

        self.ledger
            .lock()
            .unwrap()
            .pending
            .insert(request.request_id.clone(), request.clone());

        info!(
            request_id = %request.request_id,
            action = %request.action_name,
            "Created approval request"
        );

        let notifiers = self.notifiers.lock().unwrap().clone();
        for notifier in notifiers {
            let request = request.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&request).await {
                    warn!(request_id = %request.request_id, error = %e, "Approval notifier failed");
                }
            });
        }

        request
    }

    /// Apply a human decision to a pending request.
    ///
    /// A request past its expiration resolves as `Expired` no matter what
    /// the caller decided. Only an approval hands back the action name and
    /// parameters — the caller still executes through the registry so that
    /// stats and error handling stay on the single code path.
    pub fn resolve(
        &self,
        request_id: &str,
        approved: bool,
        comments: &str,
        approver: &str,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let mut ledger = self.ledger.lock().unwrap();
        let mut request = ledger
            .pending
            .remove(request_id)
            .ok_or_else(|| ApprovalError::NotFound(request_id.to_string()))?;

        let now = Timestamp::now();
        if now.0 > request.expires_at.0 {
            request.status = ApprovalStatus::Expired;
            request.comments = Some("Request expired".to_string());
            request.resolved_at = Some(now);
            warn!(request_id = %request_id, "Approval request expired before resolution");
            ledger.history.push(request);
            return Ok(ApprovalOutcome::Expired);
        }

        request.status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        request.approver = Some(approver.to_string());
        request.comments = (!comments.is_empty()).then(|| comments.to_string());
        request.resolved_at = Some(now);

        info!(
            request_id = %request_id,
            status = %request.status,
            approver = %approver,
            "Approval request resolved"
        );

        let outcome = if approved {
            ApprovalOutcome::Approved {
                action_name: request.action_name.clone(),
                params: request.params.clone(),
                approver: approver.to_string(),
            }
        } else {
            ApprovalOutcome::Rejected
        };
        ledger.history.push(request);
        Ok(outcome)
    }

    /// One reconciliation pass: force-expire every pending request past its
    /// expiration and move it to history. Returns the expired request IDs.
    pub fn sweep_expired(&self) -> Vec<String> {
        let mut ledger = self.ledger.lock().unwrap();
        let now = Timestamp::now();

        let expired_ids: Vec<String> = ledger
            .pending
            .values()
            .filter(|r| now.0 > r.expires_at.0)
            .map(|r| r.request_id.clone())
            .collect();

        for id in &expired_ids {
            if let Some(mut request) = ledger.pending.remove(id) {
                request.status = ApprovalStatus::Expired;
                request.comments = Some("Auto-expired".to_string());
                request.resolved_at = Some(now);
                info!(request_id = %id, "Auto-expired approval request");
                ledger.history.push(request);
            }
        }

        expired_ids
    }

    /// Snapshot of pending requests, oldest first.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        let ledger = self.ledger.lock().unwrap();
        let mut pending: Vec<ApprovalRequest> = ledger.pending.values().cloned().collect();
        pending.sort_by_key(|r| r.created_at);
        pending
    }

    /// The most recent `limit` history entries, oldest first within that
    /// window.
    pub fn history(&self, limit: usize) -> Vec<ApprovalRequest> {
        let ledger = self.ledger.lock().unwrap();
        let start = ledger.history.len().saturating_sub(limit);
        ledger.history[start..].to_vec()
    }

    /// Aggregate workflow statistics.
    pub fn stats(&self) -> ApprovalStats {
        let ledger = self.ledger.lock().unwrap();
        let total_resolved = ledger.history.len();
        let approved = ledger
            .history
            .iter()
            .filter(|r| r.status == ApprovalStatus::Approved)
            .count();
        let rejected = ledger
            .history
            .iter()
            .filter(|r| r.status == ApprovalStatus::Rejected)
            .count();
        let expired = ledger
            .history
            .iter()
            .filter(|r| r.status == ApprovalStatus::Expired)
            .count();

        ApprovalStats {
            total_resolved,
            approved,
            rejected,
            expired,
            pending: ledger.pending.len(),
            approval_rate: if total_resolved > 0 {
                approved as f64 / total_resolved as f64
            } else {
                0.0
            },
        }
    }

    #[cfg(test)]
    fn backdate_expiration(&self, request_id: &str, expires_at: Timestamp) {
        let mut ledger = self.ledger.lock().unwrap();
        if let Some(request) = ledger.pending.get_mut(request_id) {
            request.expires_at = expires_at;
        }
    }
}
