//! Webhook reply action handler.
//!
//! Posts a structured response payload back to an external integration's
//! callback URL. Outbound calls are approval-gated at registration.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use relay_core::types::Timestamp;

use crate::error::ActionError;
use crate::registry::ActionHandler;
use crate::types::ActionParams;

/// Handler for the `webhook_reply` action (approval required).
pub struct WebhookReplyHandler {
    client: reqwest::Client,
}

impl WebhookReplyHandler {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookReplyHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for WebhookReplyHandler {
    async fn execute(&self, params: &ActionParams) -> Result<Value, ActionError> {
        let response_url = params
            .str_field("response_url")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ActionError::InvalidParams("response_url is required".to_string()))?;

        let response_data = match params.get("response_data") {
            None => Value::Object(serde_json::Map::new()),
            Some(v @ Value::Object(_)) => v.clone(),
            Some(_) => {
                return Err(ActionError::InvalidParams(
                    "response_data must be an object".to_string(),
                ))
            }
        };

        let response_type = params.str_field("response_type").unwrap_or("success");
        let client_id = params.str_field("client_id").map(str::to_string);
        let reply_id = Uuid::new_v4().to_string();

        tracing::info!(reply_id = %reply_id, url = %response_url, "Sending webhook reply");

        let payload = json!({
            "status": response_type,
            "client_id": client_id.clone(),
            "timestamp": Timestamp::now().to_rfc3339(),
            "reply_id": reply_id.clone(),
            "data": response_data,
        });

        let response = self
            .client
            .post(response_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ActionError::Failed(format!("webhook reply failed: {}", e)))?;

        let response_status = response.status().as_u16();
        let response_text = response
            .text()
            .await
            .map_err(|e| ActionError::Failed(format!("webhook reply body unreadable: {}", e)))?;

        tracing::info!(reply_id = %reply_id, status = response_status, "Webhook reply delivered");

        Ok(json!({
            "reply_id": reply_id,
            "status": "sent",
            "response_status": response_status,
            "response_text": response_text,
            "client_id": client_id,
            "timestamp": Timestamp::now().to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_requires_response_url() {
        let handler = WebhookReplyHandler::new();
        let err = handler.execute(&ActionParams::default()).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_reply_rejects_empty_response_url() {
        let handler = WebhookReplyHandler::new();
        let params = ActionParams::new(json!({"response_url": ""}));
        let err = handler.execute(&params).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_reply_rejects_non_object_response_data() {
        let handler = WebhookReplyHandler::new();
        let params = ActionParams::new(json!({
            "response_url": "http://127.0.0.1:1/hook",
            "response_data": "text",
        }));
        let err = handler.execute(&params).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_reply_to_unreachable_endpoint_fails() {
        let handler = WebhookReplyHandler::new();
        // Port 1 on loopback: connection refused, no external traffic.
        let params = ActionParams::new(json!({
            "response_url": "http://127.0.0.1:1/hook",
            "response_data": {"ok": true},
        }));
        let err = handler.execute(&params).await.unwrap_err();
        assert!(matches!(err, ActionError::Failed(_)));
    }
}
