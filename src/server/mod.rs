//! HTTP/JSON-RPC surface: router assembly, cross-cutting middleware,
//! and per-route handlers.
//!
//! Grounded in the base crate's `AxumHttpAdapter` (`mcp_http_adapter.rs`):
//! a plain `axum::Router` bound with `TcpListener` + `axum::serve`, with
//! per-route `IntoResponse` branches rather than a single error type
//! threaded through `?`.

pub mod middleware;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::middleware::{authenticate, AuthState};
use crate::AppState;

/// Builds the full router: every route in the contract, permissive CORS,
/// the per-IP rate limiter, request logging, and credential validation.
pub fn router(state: Arc<AppState>) -> axum::Router {
    let limiter = Arc::new(middleware::RateLimiter::new(state.config.rate_limit_per_minute));
    let auth_state = Arc::new(AuthState {
        keys: state.keys.clone(),
        token_secret: state.token_secret.clone(),
    });
    routes::router(state)
        .layer(axum::middleware::from_fn_with_state(auth_state, authenticate))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(axum::middleware::from_fn_with_state(limiter, middleware::rate_limit))
        .layer(CorsLayer::permissive())
}

/// Binds `addr` and serves `state` until the process is killed.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("a2a server listening on {addr}");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await
}
