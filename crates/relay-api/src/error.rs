//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping engine errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use relay_actions::{ActionError, ApprovalError, DispatchError, WebhookError};

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 401 Unauthorized - missing or invalid signature/token.
    Unauthorized(String),
    /// 404 Not Found - unknown action or approval request.
    NotFound(String),
    /// 500 Internal Server Error - handler or engine failure.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => {
                // Log the detail; clients get a sanitized message.
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ActionError> for ApiError {
    fn from(err: ActionError) -> Self {
        match &err {
            ActionError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ActionError::InvalidParams(_) => ApiError::BadRequest(err.to_string()),
            ActionError::Failed(_) | ActionError::Handler { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        match &err {
            ApprovalError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ApprovalError::Notify(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Action(e) => e.into(),
            DispatchError::Approval(e) => e.into(),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Validation(msg) => ApiError::BadRequest(msg),
            WebhookError::Signature(msg) => ApiError::Unauthorized(msg),
            WebhookError::Dispatch { webhook_id, source } => match ApiError::from(source) {
                // Keep the correlation ID visible on non-sanitized statuses.
                ApiError::NotFound(msg) => {
                    ApiError::NotFound(format!("webhook {}: {}", webhook_id, msg))
                }
                ApiError::BadRequest(msg) => {
                    ApiError::BadRequest(format!("webhook {}: {}", webhook_id, msg))
                }
                other => other,
            },
        }
    }
}
