//! Client profile action handler.
//!
//! Returns session and server metadata for a client, with optional metric
//! and system-information sections.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use relay_core::types::Timestamp;

use crate::error::ActionError;
use crate::registry::ActionHandler;
use crate::types::ActionParams;

/// Handler for the `client_profile` action (no approval required).
pub struct ClientProfileHandler;

fn bool_param(params: &ActionParams, key: &str, default: bool) -> Result<bool, ActionError> {
    match params.get(key) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ActionError::InvalidParams(format!(
            "{} must be a boolean",
            key
        ))),
    }
}

#[async_trait]
impl ActionHandler for ClientProfileHandler {
    async fn execute(&self, params: &ActionParams) -> Result<Value, ActionError> {
        let client_id = match params.get("client_id") {
            None => Uuid::new_v4().to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ActionError::InvalidParams(
                    "client_id must be a string".to_string(),
                ))
            }
        };
        let include_metrics = bool_param(params, "include_metrics", true)?;
        let include_system_info = bool_param(params, "include_system_info", true)?;

        tracing::info!(client_id = %client_id, "Retrieving client profile");

        let mut profile = json!({
            "client_id": client_id,
            "timestamp": Timestamp::now().to_rfc3339(),
            "session_id": Uuid::new_v4().to_string(),
            "status": "active",
            "request_id": params
                .str_field("request_id")
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            "capabilities": {
                "supports_async": true,
                "supports_approval": true,
                "supports_metrics": include_metrics,
                "supports_system_info": include_system_info,
            },
        });

        if include_system_info {
            profile["system_info"] = json!({
                "platform": std::env::consts::OS,
                "server_version": env!("CARGO_PKG_VERSION"),
                "server_time": Timestamp::now().to_rfc3339(),
                "timezone": "UTC",
            });
        }

        if include_metrics {
            profile["metrics"] = json!({
                "last_request_time": Timestamp::now().to_rfc3339(),
            });
        }

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_profile_with_explicit_client_id() {
        let handler = ClientProfileHandler;
        let params = ActionParams::new(json!({"client_id": "acme"}));
        let profile = handler.execute(&params).await.unwrap();
        assert_eq!(profile["client_id"], json!("acme"));
        assert_eq!(profile["status"], json!("active"));
        assert!(profile.get("system_info").is_some());
        assert!(profile.get("metrics").is_some());
    }

    #[tokio::test]
    async fn test_profile_generates_client_id_when_missing() {
        let handler = ClientProfileHandler;
        let profile = handler.execute(&ActionParams::default()).await.unwrap();
        assert!(!profile["client_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_sections_can_be_disabled() {
        let handler = ClientProfileHandler;
        let params = ActionParams::new(json!({
            "client_id": "acme",
            "include_metrics": false,
            "include_system_info": false,
        }));
        let profile = handler.execute(&params).await.unwrap();
        assert!(profile.get("system_info").is_none());
        assert!(profile.get("metrics").is_none());
        assert_eq!(profile["capabilities"]["supports_metrics"], json!(false));
    }

    #[tokio::test]
    async fn test_profile_rejects_non_string_client_id() {
        let handler = ClientProfileHandler;
        let params = ActionParams::new(json!({"client_id": 42}));
        let err = handler.execute(&params).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_profile_rejects_non_bool_toggle() {
        let handler = ClientProfileHandler;
        let params = ActionParams::new(json!({"include_metrics": "yes"}));
        let err = handler.execute(&params).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidParams(_)));
    }
}
