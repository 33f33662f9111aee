//! Token-bucket rate limiter middleware.
//!
//! Limits requests to a configurable number per second. The bucket refills
//! wholesale once the window elapses; a burst beyond the budget gets 429.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Shared state for the rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_sec: u32,
    bucket: Arc<Mutex<(u32, Instant)>>,
}

impl RateLimiter {
    /// Create a rate limiter allowing `max_per_sec` requests per second.
    pub fn new(max_per_sec: u32) -> Self {
        Self {
            max_per_sec,
            bucket: Arc::new(Mutex::new((max_per_sec, Instant::now()))),
        }
    }

    /// Try to acquire a token. Returns `true` if the request is allowed.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.bucket.lock().unwrap();
        if state.1.elapsed() >= Duration::from_secs(1) {
            state.0 = self.max_per_sec;
            state.1 = Instant::now();
        }
        if state.0 > 0 {
            state.0 -= 1;
            true
        } else {
            false
        }
    }
}

/// Axum middleware that enforces the rate limit.
pub async fn rate_limit_middleware(
    axum::extract::Extension(limiter): axum::extract::Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.try_acquire() {
        next.run(req).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "too_many_requests",
                "message": "Rate limit exceeded"
            })),
        )
            .into_response()
    }
}
