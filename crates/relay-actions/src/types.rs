//! Core types and value objects for the dispatch engine.
//!
//! Defines action metadata, approval requests, and their supporting
//! enumerations.

use relay_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// =============================================================================
// Enums
// =============================================================================

/// Approval request lifecycle states.
///
/// `Pending` is the only non-terminal state; a request leaves it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
            ApprovalStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            "expired" => Ok(ApprovalStatus::Expired),
            _ => Err(format!("Unknown approval status: {}", s)),
        }
    }
}

/// Transport-correlation states for an external request.
///
/// Purely diagnostic; the approval ledger is the authoritative record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Processing,
    AwaitingApproval,
    Completed,
    Rejected,
    Expired,
    Error,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Processing => write!(f, "processing"),
            RequestState::AwaitingApproval => write!(f, "awaiting_approval"),
            RequestState::Completed => write!(f, "completed"),
            RequestState::Rejected => write!(f, "rejected"),
            RequestState::Expired => write!(f, "expired"),
            RequestState::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Domain Structs
// =============================================================================

/// Opaque parameter mapping passed to action handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionParams {
    pub data: Value,
}

impl ActionParams {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

impl Default for ActionParams {
    fn default() -> Self {
        Self {
            data: Value::Object(serde_json::Map::new()),
        }
    }
}

/// Explicit registration metadata for an action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionMetadata {
    pub description: String,
    pub requires_approval: bool,
}

impl ActionMetadata {
    pub fn new(description: impl Into<String>, requires_approval: bool) -> Self {
        Self {
            description: description.into(),
            requires_approval,
        }
    }
}

/// Read-only snapshot of one registered action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSummary {
    pub name: String,
    pub description: String,
    pub requires_approval: bool,
    pub invocation_count: u64,
    pub total_secs: f64,
    /// 0.0 when the action has never been invoked.
    pub average_secs: f64,
    pub last_invoked: Option<Timestamp>,
}

/// Aggregate registry statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_actions: usize,
    pub total_invocations: u64,
    pub total_secs: f64,
    pub average_secs: f64,
}

/// A pending or resolved approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: String,
    pub action_name: String,
    pub params: ActionParams,
    pub status: ApprovalStatus,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub approver: Option<String>,
    pub comments: Option<String>,
    pub resolved_at: Option<Timestamp>,
}

/// Aggregate approval-workflow statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalStats {
    pub total_resolved: usize,
    pub approved: usize,
    pub rejected: usize,
    pub expired: usize,
    pub pending: usize,
    /// approved / total_resolved; 0.0 when nothing has been resolved yet.
    pub approval_rate: f64,
}

/// Diagnostic record correlating an external request ID with its progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRequest {
    pub request_id: String,
    pub action_name: String,
    pub params: ActionParams,
    pub state: RequestState,
    pub updated_at: Timestamp,
}

/// Result of handling an inbound trigger.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The action executed immediately.
    Completed { result: Value },
    /// The action is approval-gated; a pending request was created instead.
    AwaitingApproval {
        request_id: String,
        approval_path: String,
    },
}

/// What a resolve attempt produced from the coordinator's point of view.
#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
    /// Approved: the caller executes with the original name and parameters.
    Approved {
        action_name: String,
        params: ActionParams,
        approver: String,
    },
    Rejected,
    Expired,
}

/// Terminal result of an approval decision, after any execution.
#[derive(Debug, Clone)]
pub enum ResolutionOutcome {
    Executed { result: Value, approver: String },
    Rejected,
    Expired,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_status_display() {
        assert_eq!(ApprovalStatus::Pending.to_string(), "pending");
        assert_eq!(ApprovalStatus::Approved.to_string(), "approved");
        assert_eq!(ApprovalStatus::Rejected.to_string(), "rejected");
        assert_eq!(ApprovalStatus::Expired.to_string(), "expired");
    }

    #[test]
    fn test_approval_status_from_str() {
        assert_eq!(
            "pending".parse::<ApprovalStatus>().unwrap(),
            ApprovalStatus::Pending
        );
        assert_eq!(
            "approved".parse::<ApprovalStatus>().unwrap(),
            ApprovalStatus::Approved
        );
        assert_eq!(
            "rejected".parse::<ApprovalStatus>().unwrap(),
            ApprovalStatus::Rejected
        );
        assert_eq!(
            "expired".parse::<ApprovalStatus>().unwrap(),
            ApprovalStatus::Expired
        );
        assert!("invalid".parse::<ApprovalStatus>().is_err());
    }

    #[test]
    fn test_approval_status_serde_round_trip() {
        for variant in [
            ApprovalStatus::Pending,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
            ApprovalStatus::Expired,
        ] {
            let json = serde_json::to_string(&variant).unwrap();
            let rt: ApprovalStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(variant, rt);
        }
    }

    #[test]
    fn test_request_state_display() {
        assert_eq!(RequestState::Processing.to_string(), "processing");
        assert_eq!(
            RequestState::AwaitingApproval.to_string(),
            "awaiting_approval"
        );
        assert_eq!(RequestState::Completed.to_string(), "completed");
        assert_eq!(RequestState::Rejected.to_string(), "rejected");
        assert_eq!(RequestState::Expired.to_string(), "expired");
        assert_eq!(RequestState::Error.to_string(), "error");
    }

    #[test]
    fn test_action_params_accessors() {
        let params = ActionParams::new(serde_json::json!({
            "client_id": "acme",
            "count": 3,
        }));
        assert_eq!(params.str_field("client_id"), Some("acme"));
        assert_eq!(params.get("count").and_then(Value::as_i64), Some(3));
        assert!(params.get("missing").is_none());
        assert!(params.str_field("count").is_none());
    }

    #[test]
    fn test_action_params_default_is_empty_object() {
        let params = ActionParams::default();
        assert!(params.data.as_object().map(|o| o.is_empty()).unwrap_or(false));
    }

    #[test]
    fn test_action_metadata_new() {
        let meta = ActionMetadata::new("deletes a client", true);
        assert_eq!(meta.description, "deletes a client");
        assert!(meta.requires_approval);
    }
}
