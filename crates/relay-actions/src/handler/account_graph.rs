//! Account graph extraction handler.
//!
//! Builds a small graph from a task-shaped webhook payload: the task itself,
//! its assignees, and any populated custom fields become nodes; assignment
//! and field ownership become edges.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use relay_core::types::Timestamp;

use crate::error::ActionError;
use crate::registry::ActionHandler;
use crate::types::ActionParams;

/// Handler for the `account_graph` action (no approval required).
pub struct AccountGraphHandler;

fn str_or_unknown(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

#[async_trait]
impl ActionHandler for AccountGraphHandler {
    async fn execute(&self, params: &ActionParams) -> Result<Value, ActionError> {
        let client_id = params
            .str_field("client_id")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ActionError::InvalidParams("client_id is required".to_string()))?;

        let webhook_data = match params.get("webhook_data") {
            Some(v @ Value::Object(_)) => v.clone(),
            Some(_) => {
                return Err(ActionError::InvalidParams(
                    "webhook_data must be an object".to_string(),
                ))
            }
            None => Value::Object(serde_json::Map::new()),
        };

        tracing::info!(client_id = %client_id, "Extracting account graph");

        let mut nodes: Vec<Value> = Vec::new();
        let mut edges: Vec<Value> = Vec::new();

        if let Some(task) = webhook_data.get("task").filter(|t| t.is_object()) {
            let task_id = str_or_unknown(task, "id");
            let task_node_id = format!("task_{}", task_id);

            nodes.push(json!({
                "node_id": task_node_id.clone(),
                "node_type": "task",
                "properties": {
                    "name": task.get("name").and_then(Value::as_str).unwrap_or(""),
                    "description": task.get("description").and_then(Value::as_str).unwrap_or(""),
                    "status": task.pointer("/status/status").and_then(Value::as_str).unwrap_or(""),
                    "priority": task.pointer("/priority/priority").and_then(Value::as_str).unwrap_or(""),
                    "due_date": task.get("due_date").cloned().unwrap_or(Value::Null),
                    "created_date": task.get("date_created").cloned().unwrap_or(Value::Null),
                    "updated_date": task.get("date_updated").cloned().unwrap_or(Value::Null),
                },
            }));

            for assignee in task
                .get("assignees")
                .and_then(Value::as_array)
                .map(|a| a.as_slice())
                .unwrap_or(&[])
            {
                let user_id = str_or_unknown(assignee, "id");
                nodes.push(json!({
                    "node_id": format!("user_{}", user_id),
                    "node_type": "user",
                    "properties": {
                        "username": assignee.get("username").and_then(Value::as_str).unwrap_or(""),
                        "email": assignee.get("email").and_then(Value::as_str).unwrap_or(""),
                    },
                }));
                edges.push(json!({
                    "edge_id": format!("assigns_{}_{}", task_id, user_id),
                    "source_node": task_node_id.clone(),
                    "target_node": format!("user_{}", user_id),
                    "edge_type": "assigned_to",
                    "properties": {
                        "assigned_date": task.get("date_created").cloned().unwrap_or(Value::Null),
                    },
                }));
            }

            for field in task
                .get("custom_fields")
                .and_then(Value::as_array)
                .map(|a| a.as_slice())
                .unwrap_or(&[])
            {
                // Empty fields carry no account knowledge.
                let has_value = field
                    .get("value")
                    .map(|v| !v.is_null() && v.as_str() != Some(""))
                    .unwrap_or(false);
                if !has_value {
                    continue;
                }
                let field_id = str_or_unknown(field, "id");
                nodes.push(json!({
                    "node_id": format!("field_{}", field_id),
                    "node_type": "custom_field",
                    "properties": {
                        "name": field.get("name").and_then(Value::as_str).unwrap_or(""),
                        "type": field.get("type").and_then(Value::as_str).unwrap_or(""),
                        "value": field.get("value").cloned().unwrap_or(Value::Null),
                    },
                }));
                edges.push(json!({
                    "edge_id": format!("has_field_{}_{}", task_id, field_id),
                    "source_node": task_node_id.clone(),
                    "target_node": format!("field_{}", field_id),
                    "edge_type": "has_custom_field",
                    "properties": {},
                }));
            }
        }

        tracing::info!(
            client_id = %client_id,
            nodes = nodes.len(),
            "Account graph extracted"
        );

        Ok(json!({
            "client_id": client_id,
            "extraction_id": Uuid::new_v4().to_string(),
            "timestamp": Timestamp::now().to_rfc3339(),
            "metadata": {
                "total_nodes": nodes.len(),
                "total_edges": edges.len(),
                "extraction_method": "webhook_task_payload",
            },
            "nodes": nodes,
            "edges": edges,
        }))
    }
}
