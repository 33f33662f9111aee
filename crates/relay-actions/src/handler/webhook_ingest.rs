//! Webhook ingest action handler.
//!
//! Normalizes a raw webhook payload into a processed record: resolves the
//! client ID, lifts task data and custom fields to the top level, and stamps
//! processing metadata.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use relay_core::types::Timestamp;

use crate::error::ActionError;
use crate::registry::ActionHandler;
use crate::types::ActionParams;

/// Handler for the `webhook_ingest` action (no approval required).
pub struct WebhookIngestHandler;

#[async_trait]
impl ActionHandler for WebhookIngestHandler {
    async fn execute(&self, params: &ActionParams) -> Result<Value, ActionError> {
        let webhook_data = match params.get("webhook_data") {
            Some(v @ Value::Object(_)) => v.clone(),
            Some(_) => {
                return Err(ActionError::InvalidParams(
                    "webhook_data must be an object".to_string(),
                ))
            }
            None => Value::Object(serde_json::Map::new()),
        };

        // Client ID from the params, falling back to the payload itself.
        let client_id = params
            .str_field("client_id")
            .or_else(|| webhook_data.get("client_id").and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ActionError::InvalidParams(
                    "client_id not found in webhook data or parameters".to_string(),
                )
            })?
            .to_string();

        let webhook_id = params
            .str_field("webhook_id")
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let webhook_type = params.str_field("webhook_type").unwrap_or("unknown");

        tracing::info!(client_id = %client_id, webhook_id = %webhook_id, "Ingesting webhook data");

        let payload_bytes = serde_json::to_string(&webhook_data)
            .map(|s| s.len())
            .unwrap_or(0);

        let mut processed = json!({
            "webhook_id": webhook_id,
            "client_id": client_id,
            "webhook_type": webhook_type,
            "timestamp": Timestamp::now().to_rfc3339(),
            "webhook_data": webhook_data,
            "status": "processed",
            "metadata": {
                "integration_version": "1.0",
                "processed_at": Timestamp::now().to_rfc3339(),
                "payload_bytes": payload_bytes,
            },
        });

        // Lift recognized sections for downstream consumers.
        if let Some(task) = processed["webhook_data"].get("task").cloned() {
            processed["task_data"] = task;
        }
        if let Some(fields) = processed["webhook_data"].get("custom_fields").cloned() {
            processed["custom_fields"] = fields;
        }

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ingest_with_explicit_client_id() {
        let handler = WebhookIngestHandler;
        let params = ActionParams::new(json!({
            "webhook_data": {"event": "created"},
            "client_id": "acme",
            "webhook_id": "wh-1",
            "webhook_type": "task_board",
        }));
        let result = handler.execute(&params).await.unwrap();
        assert_eq!(result["client_id"], json!("acme"));
        assert_eq!(result["webhook_id"], json!("wh-1"));
        assert_eq!(result["webhook_type"], json!("task_board"));
        assert_eq!(result["status"], json!("processed"));
        assert!(result["metadata"]["payload_bytes"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_ingest_client_id_from_payload() {
        let handler = WebhookIngestHandler;
        let params = ActionParams::new(json!({
            "webhook_data": {"client_id": "from-payload"},
        }));
        let result = handler.execute(&params).await.unwrap();
        assert_eq!(result["client_id"], json!("from-payload"));
    }

    #[tokio::test]
    async fn test_ingest_without_client_id_fails() {
        let handler = WebhookIngestHandler;
        let params = ActionParams::new(json!({"webhook_data": {"event": "x"}}));
        let err = handler.execute(&params).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_object_webhook_data() {
        let handler = WebhookIngestHandler;
        let params = ActionParams::new(json!({
            "webhook_data": "raw text",
            "client_id": "acme",
        }));
        let err = handler.execute(&params).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_ingest_lifts_task_and_custom_fields() {
        let handler = WebhookIngestHandler;
        let params = ActionParams::new(json!({
            "client_id": "acme",
            "webhook_data": {
                "task": {"id": "t1"},
                "custom_fields": [{"name": "priority", "value": "high"}],
            },
        }));
        let result = handler.execute(&params).await.unwrap();
        assert_eq!(result["task_data"]["id"], json!("t1"));
        assert_eq!(result["custom_fields"][0]["name"], json!("priority"));
    }

    #[tokio::test]
    async fn test_ingest_generates_webhook_id_when_missing() {
        let handler = WebhookIngestHandler;
        let params = ActionParams::new(json!({"client_id": "acme"}));
        let result = handler.execute(&params).await.unwrap();
        assert!(!result["webhook_id"].as_str().unwrap().is_empty());
        assert_eq!(result["webhook_type"], json!("unknown"));
    }
}
