//! Cross-cutting HTTP middleware: per-IP sliding-window rate limiting
//! and request logging. Authentication lives in [`crate::auth::middleware`]
//! and is layered per-route rather than globally, since only some routes
//! require it.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error;

const WINDOW: Duration = Duration::from_secs(60);

struct Bucket {
    window_start: Instant,
    count: u32,
}

/// A per-key sliding-window counter. Windows reset lazily on the first
/// request to land after they expire, rather than on a timer.
pub struct RateLimiter {
    max_requests: u32,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32) -> Self {
        Self {
            max_requests,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    async fn allow(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            window_start: now,
            count: 0,
        });
        if now.duration_since(bucket.window_start) >= WINDOW {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count += 1;
        bucket.count <= self.max_requests
    }
}

/// Rejects with JSON-RPC `internal-error` once a client IP exceeds
/// `max_requests` within the 60-second window. Requests with no known
/// peer address (e.g. in-process tests) share a single `"unknown"`
/// bucket rather than bypassing the limiter.
pub async fn rate_limit(State(limiter): State<Arc<RateLimiter>>, request: Request, next: Next) -> Response {
    let key = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !limiter.allow(&key).await {
        let body = error::JsonRpcErrorBody {
            code: error::code::INTERNAL,
            message: "rate limit exceeded".to_string(),
            data: None,
        };
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "jsonrpc": "2.0", "error": body, "id": serde_json::Value::Null })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Logs method, path, status, and duration for every request.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    log::info!(
        "{method} {path} {} {}ms",
        response.status(),
        started.elapsed().as_millis()
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limiter_allows_up_to_max_then_rejects() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(!limiter.allow("1.2.3.4").await);
    }

    #[tokio::test]
    async fn limiter_tracks_keys_independently() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.allow("a").await);
        assert!(limiter.allow("b").await);
        assert!(!limiter.allow("a").await);
    }
}
