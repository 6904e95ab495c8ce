//! Authentication middleware: inspects the `Authorization` header and
//! attaches the decoded identity to the request, or rejects with
//! `auth-required` when a route demands it and nothing validated.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::sync::Arc;

use crate::auth::keys::KeyService;
use crate::auth::token::{self, Claims};
use crate::error::{self, JsonRpcErrorBody};

#[derive(Debug, Clone)]
pub enum Identity {
    Token(Claims),
    ApiKey {
        label: String,
        permissions: Vec<String>,
    },
}

impl Identity {
    pub fn has_permission(&self, required: &str) -> bool {
        match self {
            Identity::Token(claims) => token::has_permission(claims, required),
            Identity::ApiKey { permissions, .. } => {
                permissions.iter().any(|p| p == "admin" || p == required)
            }
        }
    }
}

pub struct AuthState {
    pub keys: Arc<KeyService>,
    pub token_secret: Vec<u8>,
}

fn auth_required_response() -> Response {
    let body = JsonRpcErrorBody {
        code: error::code::AUTH_REQUIRED,
        message: "authentication required".to_string(),
        data: None,
    };
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": body }))).into_response()
}

/// Tries `Bearer <token>` then `ApiKey <key>`; on success inserts an
/// [`Identity`] extension. Routes that require authentication should
/// extract `Extension<Identity>` and return `auth-required` themselves
/// if it is absent — this layer only rejects when validation was
/// *attempted* and failed, matching "auth marked required" at the route.
pub async fn authenticate(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let Some(header) = header else {
        return next.run(request).await;
    };

    if let Some(raw_token) = header.strip_prefix("Bearer ") {
        return match token::verify(&state.token_secret, raw_token) {
            Ok(claims) => {
                request.extensions_mut().insert(Identity::Token(claims));
                next.run(request).await
            }
            Err(_) => auth_required_response(),
        };
    }

    if let Some(raw_key) = header.strip_prefix("ApiKey ") {
        return match state.keys.validate(raw_key).await {
            Ok(Some(record)) => {
                request.extensions_mut().insert(Identity::ApiKey {
                    label: record.label,
                    permissions: record.permissions,
                });
                next.run(request).await
            }
            _ => auth_required_response(),
        };
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::keys::ApiKeyStore;
    use crate::storage::InMemoryRepository;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn state() -> Arc<AuthState> {
        Arc::new(AuthState {
            keys: Arc::new(KeyService::new(Arc::new(InMemoryRepository::<ApiKeyStore>::new()))),
            token_secret: b"test-secret".to_vec(),
        })
    }

    async fn identity_echo(axum::extract::Extension(identity): axum::extract::Extension<Identity>) -> String {
        match identity {
            Identity::Token(claims) => claims.sub,
            Identity::ApiKey { label, .. } => label,
        }
    }

    fn app(state: Arc<AuthState>) -> Router {
        Router::new()
            .route("/whoami", get(identity_echo))
            .layer(axum::middleware::from_fn_with_state(state.clone(), authenticate))
            .with_state(state)
    }

    #[tokio::test]
    async fn valid_bearer_token_attaches_identity() {
        let state = state();
        let tok = token::issue(&state.token_secret, "agent-9", vec![], chrono::Duration::hours(1));
        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header("authorization", format!("Bearer {tok}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_bearer_token_is_rejected() {
        let state = state();
        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header("authorization", "Bearer garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_header_passes_through_unauthenticated() {
        let state = state();
        let response = app(state)
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        // No identity extension; the handler itself would 500 on missing
        // extension in a real deployment, but the middleware does not
        // reject here — only routes that require auth do.
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
