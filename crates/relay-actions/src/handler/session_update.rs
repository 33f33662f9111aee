//! Session update action handler.
//!
//! Mutates client session state, so registration gates it behind approval.

use async_trait::async_trait;
use serde_json::{json, Value};

use relay_core::types::Timestamp;

use crate::error::ActionError;
use crate::registry::ActionHandler;
use crate::types::ActionParams;

/// Handler for the `session_update` action (approval required).
pub struct SessionUpdateHandler;

#[async_trait]
impl ActionHandler for SessionUpdateHandler {
    async fn execute(&self, params: &ActionParams) -> Result<Value, ActionError> {
        let client_id = params
            .str_field("client_id")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ActionError::InvalidParams("client_id is required".to_string()))?;

        let session_data = match params.get("session_data") {
            None => Value::Object(serde_json::Map::new()),
            Some(v @ Value::Object(_)) => v.clone(),
            Some(_) => {
                return Err(ActionError::InvalidParams(
                    "session_data must be an object".to_string(),
                ))
            }
        };

        let update_reason = params
            .str_field("update_reason")
            .unwrap_or("No reason provided");

        tracing::info!(client_id = %client_id, reason = %update_reason, "Updating client session");

        Ok(json!({
            "client_id": client_id,
            "status": "updated",
            "update_reason": update_reason,
            "session_data": session_data,
            "timestamp": Timestamp::now().to_rfc3339(),
            "updated_by": "human_approval",
        }))
    }
}
