//! Webhook routing and validation.
//!
//! Maps inbound webhook types to actions, authenticates payloads with
//! HMAC-SHA256, and handles the recognized task-board integration shape.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use relay_core::types::Timestamp;

use crate::coordinator::RequestCoordinator;
use crate::error::WebhookError;
use crate::types::{ActionParams, DispatchOutcome};

type HmacSha256 = Hmac<Sha256>;

/// Webhook type for the recognized task-board integration.
pub const TASK_BOARD_TYPE: &str = "task_board";

/// Action chained onto task-board dispatches that carry a `task` object.
const GRAPH_ACTION: &str = "account_graph";

/// Outcome of one webhook dispatch, correlated by a generated webhook ID.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookReceipt {
    pub webhook_id: Uuid,
    pub webhook_type: String,
    /// "processed" or "awaiting_approval".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub result: Value,
    pub received_at: String,
}

/// Routes inbound webhooks to actions and validates their signatures.
pub struct WebhookRouter {
    coordinator: Arc<RequestCoordinator>,
    default_action: String,
    secrets: Mutex<HashMap<String, String>>,
    routes: Mutex<HashMap<String, String>>,
}

impl WebhookRouter {
    pub fn new(coordinator: Arc<RequestCoordinator>, default_action: impl Into<String>) -> Self {
        Self {
            coordinator,
            default_action: default_action.into(),
            secrets: Mutex::new(HashMap::new()),
            routes: Mutex::new(HashMap::new()),
        }
    }

    /// Register the shared secret for a webhook type. Last writer wins.
    pub fn register_secret(&self, webhook_type: &str, secret: &str) {
        self.secrets
            .lock()
            .unwrap()
            .insert(webhook_type.to_string(), secret.to_string());
        info!(webhook_type = %webhook_type, "Registered webhook secret");
    }

    /// Map a webhook type to an action name. Last writer wins.
    pub fn register_route(&self, webhook_type: &str, action_name: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(webhook_type.to_string(), action_name.to_string());
        info!(webhook_type = %webhook_type, action = %action_name, "Registered webhook route");
    }

    pub fn has_secret(&self, webhook_type: &str) -> bool {
        self.secrets.lock().unwrap().contains_key(webhook_type)
    }

    /// Canonical serialization used for signing.
    ///
    /// `serde_json::Value` objects are BTreeMap-backed, so nested keys
    /// serialize in a stable sorted order.
    pub fn canonical_payload(payload: &Value) -> String {
        serde_json::to_string(payload).unwrap_or_default()
    }

    /// Hex HMAC-SHA256 over the canonical payload. Exposed so senders and
    /// tests can produce signatures the router accepts.
    pub fn sign(secret: &str, payload: &Value) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(Self::canonical_payload(payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Validate a hex-encoded HMAC-SHA256 signature.
    ///
    /// Fails closed when no secret is registered for the type. The comparison
    /// goes through `Mac::verify_slice` and is constant-time.
    pub fn validate_signature(&self, payload: &Value, signature: &str, webhook_type: &str) -> bool {
        let secret = match self.secrets.lock().unwrap().get(webhook_type).cloned() {
            Some(secret) => secret,
            None => {
                warn!(webhook_type = %webhook_type, "No secret registered for webhook type");
                return false;
            }
        };

        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(Self::canonical_payload(payload).as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    /// Dispatch a generic webhook to its routed action.
    ///
    /// Unrouted types fall back to the configured default action. The routed
    /// action goes through the request coordinator, so an approval-gated
    /// target parks instead of executing.
    pub async fn dispatch(
        &self,
        webhook_type: &str,
        payload: Value,
    ) -> Result<WebhookReceipt, WebhookError> {
        let webhook_id = Uuid::new_v4();
        info!(webhook_type = %webhook_type, webhook_id = %webhook_id, "Processing webhook");

        Self::require_object(&payload)?;

        let action = self
            .routes
            .lock()
            .unwrap()
            .get(webhook_type)
            .cloned()
            .unwrap_or_else(|| self.default_action.clone());

        let params = ActionParams::new(json!({
            "webhook_data": payload,
            "webhook_id": webhook_id.to_string(),
            "webhook_type": webhook_type,
            "timestamp": Timestamp::now().to_rfc3339(),
        }));

        let outcome = self
            .coordinator
            .handle(&action, params, &webhook_id.to_string())
            .await
            .map_err(|source| WebhookError::Dispatch { webhook_id, source })?;

        Ok(Self::receipt(webhook_id, webhook_type, None, outcome))
    }

    /// Dispatch a webhook with the recognized task-board shape.
    ///
    /// Derives a client ID from the payload (best-effort, with a synthetic
    /// fallback) and, when a `task` object is present, chains the
    /// account-graph action to enrich the ingest result.
    pub async fn dispatch_task_board(
        &self,
        payload: Value,
    ) -> Result<WebhookReceipt, WebhookError> {
        let webhook_id = Uuid::new_v4();
        info!(webhook_id = %webhook_id, "Processing task-board webhook");

        Self::require_object(&payload)?;

        let client_id = Self::extract_client_id(&payload, &webhook_id);

        let action = self
            .routes
            .lock()
            .unwrap()
            .get(TASK_BOARD_TYPE)
            .cloned()
            .unwrap_or_else(|| self.default_action.clone());

        let params = ActionParams::new(json!({
            "webhook_data": payload.clone(),
            "client_id": client_id.clone(),
            "webhook_id": webhook_id.to_string(),
            "webhook_type": TASK_BOARD_TYPE,
            "timestamp": Timestamp::now().to_rfc3339(),
        }));

        let outcome = self
            .coordinator
            .handle(&action, params, &webhook_id.to_string())
            .await
            .map_err(|source| WebhookError::Dispatch { webhook_id, source })?;

        let outcome = match outcome {
            DispatchOutcome::Completed { mut result } => {
                if payload.get("task").is_some() {
                    let graph_params = ActionParams::new(json!({
                        "webhook_data": payload,
                        "client_id": client_id.clone(),
                        "include_task_details": true,
                    }));
                    let graph = self
                        .coordinator
                        .registry()
                        .execute(GRAPH_ACTION, &graph_params)
                        .await
                        .map_err(|e| WebhookError::Dispatch {
                            webhook_id,
                            source: e.into(),
                        })?;
                    if let Value::Object(map) = &mut result {
                        map.insert(GRAPH_ACTION.to_string(), graph);
                    }
                }
                DispatchOutcome::Completed { result }
            }
            parked => parked,
        };

        Ok(Self::receipt(
            webhook_id,
            TASK_BOARD_TYPE,
            Some(client_id),
            outcome,
        ))
    }

    /// Best-effort client ID derivation: top-level field, then a
    /// case-insensitive scan of the task's custom fields, then a synthetic
    /// ID derived from the webhook ID. Never a hard failure.
    fn extract_client_id(payload: &Value, webhook_id: &Uuid) -> String {
        if let Some(id) = payload.get("client_id").and_then(Value::as_str) {
            if !id.is_empty() {
                return id.to_string();
            }
        }

        if let Some(fields) = payload
            .get("task")
            .and_then(|t| t.get("custom_fields"))
            .and_then(Value::as_array)
        {
            for field in fields {
                let name = field.get("name").and_then(Value::as_str).unwrap_or("");
                if name.eq_ignore_ascii_case("client_id") {
                    if let Some(value) = field.get("value").and_then(Value::as_str) {
                        if !value.is_empty() {
                            return value.to_string();
                        }
                    }
                }
            }
        }

        format!("webhook_client_{}", &webhook_id.to_string()[..8])
    }

    fn require_object(payload: &Value) -> Result<(), WebhookError> {
        if payload.is_object() {
            Ok(())
        } else {
            Err(WebhookError::Validation(
                "webhook payload must be a JSON object".to_string(),
            ))
        }
    }

    fn receipt(
        webhook_id: Uuid,
        webhook_type: &str,
        client_id: Option<String>,
        outcome: DispatchOutcome,
    ) -> WebhookReceipt {
        let (status, result) = match outcome {
            DispatchOutcome::Completed { result } => ("processed", result),
            DispatchOutcome::AwaitingApproval {
                request_id,
                approval_path,
            } => (
                "awaiting_approval",
                json!({
                    "request_id": request_id,
                    "approval_path": approval_path,
                }),
            ),
        };
        WebhookReceipt {
            webhook_id,
            webhook_type: webhook_type.to_string(),
            status: status.to_string(),
            client_id,
            result,
            received_at: Timestamp::now().to_rfc3339(),
        }
    }
}
