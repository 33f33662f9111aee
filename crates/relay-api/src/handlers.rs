//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path/body input via axum extractors, talks to the
//! dispatch engine through AppState, and shapes the JSON envelope. Every
//! terminal response carries a status tag and the correlation ID the caller
//! needs to follow up asynchronously.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use relay_actions::webhook::TASK_BOARD_TYPE;
use relay_actions::{
    ActionError, ActionParams, ActionSummary, ActiveRequest, ApprovalRequest, ApprovalStats,
    DispatchError, DispatchOutcome, RegistryStats, ResolutionOutcome, WebhookError,
};
use relay_core::types::Timestamp;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 webhook signature.
pub const SIGNATURE_HEADER: &str = "x-relay-signature";

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ActionRequest {
    pub params: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub comments: Option<String>,
    pub approver: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Uniform envelope for action execution and approval resolution.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub request_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionEnvelope {
    fn new(request_id: impl Into<String>, status: &str) -> Self {
        Self {
            request_id: request_id.into(),
            status: status.to_string(),
            result: None,
            approval_path: None,
            approver: None,
            message: None,
            error: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub server_id: Uuid,
    pub uptime_secs: u64,
    pub active_requests: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionsResponse {
    pub actions: Vec<ActionSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingApprovalsResponse {
    pub pending: Vec<ApprovalRequest>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalHistoryResponse {
    pub history: Vec<ApprovalRequest>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub server_id: Uuid,
    pub uptime_secs: u64,
    pub registered_actions: usize,
    pub pending_approvals: usize,
    pub active_requests: Vec<ActiveRequest>,
    pub registry: RegistryStats,
    pub approvals: ApprovalStats,
}

// =============================================================================
// Action endpoints
// =============================================================================

fn dispatch_error_status(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::Action(ActionError::NotFound(_)) => StatusCode::NOT_FOUND,
        DispatchError::Action(ActionError::InvalidParams(_)) => StatusCode::BAD_REQUEST,
        DispatchError::Approval(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_envelope(request_id: &str, err: DispatchError) -> Response {
    let status = dispatch_error_status(&err);
    tracing::error!(request_id = %request_id, error = %err, "Request failed");
    let mut envelope = ActionEnvelope::new(request_id, "error");
    envelope.error = Some(err.to_string());
    (status, Json(envelope)).into_response()
}

/// POST /api/actions/{name} - execute or park a named action.
pub async fn handle_action(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<ActionRequest>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let params = ActionParams::new(body.params.unwrap_or_else(|| json!({})));

    match state.coordinator.handle(&name, params, &request_id).await {
        Ok(DispatchOutcome::Completed { result }) => {
            let mut envelope = ActionEnvelope::new(&request_id, "completed");
            envelope.result = Some(result);
            Json(envelope).into_response()
        }
        Ok(DispatchOutcome::AwaitingApproval {
            request_id,
            approval_path,
        }) => {
            let mut envelope = ActionEnvelope::new(&request_id, "awaiting_approval");
            envelope.approval_path = Some(approval_path);
            envelope.message = Some("Action requires human approval".to_string());
            Json(envelope).into_response()
        }
        Err(e) => error_envelope(&request_id, e),
    }
}

/// GET /api/actions - list registered actions with statistics.
pub async fn list_actions(State(state): State<AppState>) -> Json<ActionsResponse> {
    let actions = state.coordinator.registry().list();
    let total = actions.len();
    Json(ActionsResponse { actions, total })
}

// =============================================================================
// Approval endpoints
// =============================================================================

/// POST /api/approvals/{request_id} - apply a human decision.
pub async fn resolve_approval(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(decision): Json<ApprovalDecision>,
) -> Response {
    let comments = decision.comments.unwrap_or_default();
    let approver = decision.approver.unwrap_or_else(|| "unknown".to_string());

    match state
        .coordinator
        .resolve_approval(&request_id, decision.approved, &comments, &approver)
        .await
    {
        Ok(ResolutionOutcome::Executed { result, approver }) => {
            let mut envelope = ActionEnvelope::new(&request_id, "approved");
            envelope.result = Some(result);
            envelope.approver = Some(approver);
            Json(envelope).into_response()
        }
        Ok(ResolutionOutcome::Rejected) => {
            let mut envelope = ActionEnvelope::new(&request_id, "rejected");
            envelope.message = Some("Action was not executed".to_string());
            Json(envelope).into_response()
        }
        Ok(ResolutionOutcome::Expired) => {
            let mut envelope = ActionEnvelope::new(&request_id, "expired");
            envelope.message = Some("Approval request expired before resolution".to_string());
            Json(envelope).into_response()
        }
        Err(e) => error_envelope(&request_id, e),
    }
}

/// GET /api/approvals - pending approval requests.
pub async fn pending_approvals(State(state): State<AppState>) -> Json<PendingApprovalsResponse> {
    let pending = state.coordinator.approvals().pending();
    let total = pending.len();
    Json(PendingApprovalsResponse { pending, total })
}

/// GET /api/approvals/history - resolved requests, most recent window.
pub async fn approval_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<ApprovalHistoryResponse> {
    let history = state
        .coordinator
        .approvals()
        .history(params.limit.unwrap_or(100));
    let total = history.len();
    Json(ApprovalHistoryResponse { history, total })
}

// =============================================================================
// Introspection endpoints
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        server_id: state.server_id,
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_requests: state.coordinator.active_requests().len(),
    })
}

/// GET /api/status - detailed server status for debugging.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let registry = state.coordinator.registry().stats();
    let approvals = state.coordinator.approvals().stats();
    Json(StatusResponse {
        server_id: state.server_id,
        uptime_secs: state.start_time.elapsed().as_secs(),
        registered_actions: registry.total_actions,
        pending_approvals: approvals.pending,
        active_requests: state.coordinator.active_requests(),
        registry,
        approvals,
    })
}

// =============================================================================
// Webhook endpoints
// =============================================================================

/// Boundary signature policy: a provided signature must validate; a missing
/// signature is only acceptable for types with no registered secret.
fn verify_webhook_signature(
    state: &AppState,
    webhook_type: &str,
    headers: &HeaderMap,
    payload: &Value,
) -> Result<(), ApiError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(signature) => {
            if state
                .webhooks
                .validate_signature(payload, signature, webhook_type)
            {
                Ok(())
            } else {
                Err(ApiError::Unauthorized(
                    "Invalid webhook signature".to_string(),
                ))
            }
        }
        None if state.webhooks.has_secret(webhook_type) => Err(ApiError::Unauthorized(
            "Missing webhook signature".to_string(),
        )),
        None => Ok(()),
    }
}

fn webhook_error_response(err: WebhookError) -> Response {
    match err {
        WebhookError::Validation(_) | WebhookError::Signature(_) => {
            ApiError::from(err).into_response()
        }
        WebhookError::Dispatch { webhook_id, source } => {
            let status = dispatch_error_status(&source);
            tracing::error!(webhook_id = %webhook_id, error = %source, "Webhook dispatch failed");
            (
                status,
                Json(json!({
                    "webhook_id": webhook_id,
                    "status": "error",
                    "error": source.to_string(),
                    "timestamp": Timestamp::now().to_rfc3339(),
                })),
            )
                .into_response()
        }
    }
}

/// POST /api/webhooks/task-board - recognized task-board integration.
pub async fn task_board_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    if let Err(e) = verify_webhook_signature(&state, TASK_BOARD_TYPE, &headers, &payload) {
        return e.into_response();
    }
    match state.webhooks.dispatch_task_board(payload).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => webhook_error_response(e),
    }
}

/// POST /api/webhooks/{webhook_type} - generic webhook dispatch.
pub async fn generic_webhook(
    State(state): State<AppState>,
    Path(webhook_type): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    if let Err(e) = verify_webhook_signature(&state, &webhook_type, &headers, &payload) {
        return e.into_response();
    }
    match state.webhooks.dispatch(&webhook_type, payload).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => webhook_error_response(e),
    }
}

// =============================================================================
// Tests
// =============================================================================
