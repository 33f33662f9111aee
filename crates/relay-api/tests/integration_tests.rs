//! Integration tests for the Relay API.
//!
//! Exercises the full stack — router, auth, dispatch engine, and the
//! built-in action set — over in-memory state. Each test builds its own
//! state; where a flow spans several requests, routers share one state.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use relay_actions::handler::register_defaults;
use relay_actions::{ActionRegistry, ApprovalCoordinator, RequestCoordinator, WebhookRouter};
use relay_api::handlers::{
    ActionEnvelope, ActionsResponse, ApprovalHistoryResponse, HealthResponse,
    PendingApprovalsResponse, StatusResponse, SIGNATURE_HEADER,
};
use relay_api::{create_router, AppState};
use relay_core::config::RelayConfig;

// =============================================================================
// Helpers
// =============================================================================

const TEST_TOKEN: &str = "test-token-12345";

/// Fresh AppState with the built-in action set and a configurable approval
/// timeout.
fn make_state_with_timeout(timeout: Duration) -> AppState {
    let registry = Arc::new(ActionRegistry::new());
    let approvals = Arc::new(ApprovalCoordinator::new(timeout));
    let coordinator = Arc::new(RequestCoordinator::new(registry, approvals));
    register_defaults(&coordinator);
    let config = RelayConfig::default();
    let webhooks = Arc::new(WebhookRouter::new(
        Arc::clone(&coordinator),
        config.webhook.default_action.clone(),
    ));
    let mut state = AppState::new(config, coordinator, webhooks);
    state.api_token = TEST_TOKEN.to_string();
    state
}

fn make_state() -> AppState {
    make_state_with_timeout(Duration::from_secs(3600))
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .body(Body::empty())
        .unwrap()
}

fn authed_post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Built-in action surface
// =============================================================================

#[tokio::test]
async fn test_health_lists_no_active_requests_initially() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_requests, 0);
}

#[tokio::test]
async fn test_builtin_actions_are_listed_with_gates() {
    let app = create_router(make_state());
    let resp = app.oneshot(authed_get("/api/actions")).await.unwrap();
    let actions: ActionsResponse = serde_json::from_value(body_json(resp).await).unwrap();

    assert_eq!(actions.total, 5);
    let gated: Vec<&str> = actions
        .actions
        .iter()
        .filter(|a| a.requires_approval)
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(gated, vec!["session_update", "webhook_reply"]);
}

#[tokio::test]
async fn test_client_profile_executes_directly() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(authed_post(
            "/api/actions/client_profile",
            json!({"params": {"client_id": "acme"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let envelope: ActionEnvelope = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(envelope.status, "completed");
    let profile = envelope.result.unwrap();
    assert_eq!(profile["client_id"], json!("acme"));
    assert_eq!(profile["status"], json!("active"));
}

#[tokio::test]
async fn test_handler_validation_failure_surfaces_as_error_envelope() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(authed_post(
            "/api/actions/client_profile",
            json!({"params": {"client_id": 42}}),
        ))
        .await
        .unwrap();
    // Handler validation failures come back wrapped, as a server-side error.
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let envelope: ActionEnvelope = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(envelope.status, "error");
    assert!(envelope.error.unwrap().contains("client_id"));
}

// =============================================================================
// Approval lifecycle
// =============================================================================

#[tokio::test]
async fn test_session_update_requires_approval_end_to_end() {
    let state = make_state();

    // 1. Trigger the gated action.
    let app = create_router(state.clone());
    let resp = app
        .oneshot(authed_post(
            "/api/actions/session_update",
            json!({"params": {"client_id": "acme", "update_reason": "tier change"}}),
        ))
        .await
        .unwrap();
    let envelope: ActionEnvelope = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(envelope.status, "awaiting_approval");

    // 2. It shows up as pending.
    let app = create_router(state.clone());
    let resp = app.oneshot(authed_get("/api/approvals")).await.unwrap();
    let pending: PendingApprovalsResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(pending.total, 1);
    assert_eq!(pending.pending[0].action_name, "session_update");

    // 3. Approve; the handler finally runs.
    let app = create_router(state.clone());
    let resp = app
        .oneshot(authed_post(
            &format!("/api/approvals/{}", envelope.request_id),
            json!({"approved": true, "approver": "alice", "comments": "ok"}),
        ))
        .await
        .unwrap();
    let resolved: ActionEnvelope = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(resolved.status, "approved");
    let result = resolved.result.unwrap();
    assert_eq!(result["client_id"], json!("acme"));
    assert_eq!(result["status"], json!("updated"));
    assert_eq!(result["update_reason"], json!("tier change"));

    // 4. Stats reflect one approved resolution and one execution.
    let app = create_router(state);
    let resp = app.oneshot(authed_get("/api/status")).await.unwrap();
    let status: StatusResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(status.approvals.approved, 1);
    assert_eq!(status.approvals.pending, 0);
    assert_eq!(status.registry.total_invocations, 1);
}

#[tokio::test]
async fn test_rejected_action_is_never_executed() {
    let state = make_state();

    let app = create_router(state.clone());
    let resp = app
        .oneshot(authed_post(
            "/api/actions/session_update",
            json!({"params": {"client_id": "acme"}}),
        ))
        .await
        .unwrap();
    let envelope: ActionEnvelope = serde_json::from_value(body_json(resp).await).unwrap();

    let app = create_router(state.clone());
    let resp = app
        .oneshot(authed_post(
            &format!("/api/approvals/{}", envelope.request_id),
            json!({"approved": false, "approver": "bob"}),
        ))
        .await
        .unwrap();
    let resolved: ActionEnvelope = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(resolved.status, "rejected");
    assert!(resolved.result.is_none());

    // Nothing executed.
    let app = create_router(state);
    let resp = app.oneshot(authed_get("/api/status")).await.unwrap();
    let status: StatusResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(status.registry.total_invocations, 0);
    assert_eq!(status.approvals.rejected, 1);
}

#[tokio::test]
async fn test_expired_request_resolves_as_expired() {
    // Zero timeout: the request is past its deadline one second after
    // creation, regardless of the approve flag sent later.
    let state = make_state_with_timeout(Duration::from_secs(0));

    let app = create_router(state.clone());
    let resp = app
        .oneshot(authed_post(
            "/api/actions/session_update",
            json!({"params": {"client_id": "acme"}}),
        ))
        .await
        .unwrap();
    let envelope: ActionEnvelope = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(envelope.status, "awaiting_approval");

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let app = create_router(state.clone());
    let resp = app
        .oneshot(authed_post(
            &format!("/api/approvals/{}", envelope.request_id),
            json!({"approved": true, "approver": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resolved: ActionEnvelope = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(resolved.status, "expired");
    assert!(resolved.result.is_none());

    // The expiry landed in history, and the handler never ran.
    let app = create_router(state);
    let resp = app
        .oneshot(authed_get("/api/approvals/history?limit=10"))
        .await
        .unwrap();
    let history: ApprovalHistoryResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(history.total, 1);
    assert_eq!(history.history[0].status.to_string(), "expired");
}

// =============================================================================
// Webhooks
// =============================================================================

#[tokio::test]
async fn test_task_board_webhook_chains_account_graph() {
    let app = create_router(make_state());
    let payload = json!({
        "task": {
            "id": "t1",
            "name": "Onboard new client",
            "assignees": [{"id": "u1", "username": "alice", "email": "a@example.com"}],
            "custom_fields": [
                {"id": "f1", "name": "Client_ID", "type": "text", "value": "acme-corp"},
            ],
        },
    });

    let resp = app
        .oneshot(authed_post("/api/webhooks/task-board", payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let receipt = body_json(resp).await;
    assert_eq!(receipt["status"], json!("processed"));
    // Client ID extracted from custom fields, case-insensitively.
    assert_eq!(receipt["client_id"], json!("acme-corp"));
    // The ingest result was enriched with the chained graph extraction.
    let graph = &receipt["result"]["account_graph"];
    assert_eq!(graph["client_id"], json!("acme-corp"));
    assert_eq!(graph["metadata"]["total_nodes"], json!(3));
    assert_eq!(graph["metadata"]["total_edges"], json!(2));
}

#[tokio::test]
async fn test_task_board_webhook_synthesizes_client_id() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(authed_post("/api/webhooks/task-board", json!({"event": "ping"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let receipt = body_json(resp).await;
    let client_id = receipt["client_id"].as_str().unwrap();
    assert!(client_id.starts_with("webhook_client_"));
    // No task data, so no graph enrichment.
    assert!(receipt["result"].get("account_graph").is_none());
}

#[tokio::test]
async fn test_signed_task_board_webhook_round_trip() {
    let state = make_state();
    state
        .webhooks
        .register_secret("task_board", "shared-secret");

    let payload = json!({"client_id": "acme"});
    let signature = WebhookRouter::sign("shared-secret", &payload);

    // Correct signature passes.
    let app = create_router(state.clone());
    let resp = app
        .oneshot(
            Request::post("/api/webhooks/task-board")
                .header("authorization", format!("Bearer {}", TEST_TOKEN))
                .header("content-type", "application/json")
                .header(SIGNATURE_HEADER, signature.clone())
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // A mutated signature is rejected.
    let mut bad = signature;
    let last = bad.pop().unwrap();
    bad.push(if last == '0' { '1' } else { '0' });

    let app = create_router(state.clone());
    let resp = app
        .oneshot(
            Request::post("/api/webhooks/task-board")
                .header("authorization", format!("Bearer {}", TEST_TOKEN))
                .header("content-type", "application/json")
                .header(SIGNATURE_HEADER, bad)
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Once a secret is registered, unsigned deliveries are refused.
    let app = create_router(state);
    let resp = app
        .oneshot(authed_post("/api/webhooks/task-board", payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_generic_webhook_routes_to_registered_action() {
    let state = make_state();
    state.webhooks.register_route("crm", "client_profile");

    let app = create_router(state);
    let resp = app
        .oneshot(authed_post("/api/webhooks/crm", json!({"source": "crm"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let receipt = body_json(resp).await;
    assert_eq!(receipt["status"], json!("processed"));
    // client_profile produced its envelope from the webhook params.
    assert_eq!(receipt["result"]["status"], json!("active"));
}

#[tokio::test]
async fn test_webhook_to_unregistered_action_is_404_with_webhook_id() {
    let state = make_state();
    state.webhooks.register_route("crm", "no_such_action");

    let app = create_router(state);
    let resp = app
        .oneshot(authed_post("/api/webhooks/crm", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body = body_json(resp).await;
    assert_eq!(body["status"], json!("error"));
    assert!(!body["webhook_id"].as_str().unwrap().is_empty());
}
