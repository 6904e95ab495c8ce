//! Per-route handlers and router assembly for the A2A HTTP/JSON-RPC surface.
//!
//! Success responses are the bare JSON value the route is documented to
//! return (a `Task`, an agent list, a plan preview, ...); only the
//! JSON-RPC entry point (`POST /a2a/tasks`) wraps its result in
//! `{jsonrpc, result, id}`. Every error response, JSON-RPC or not, uses
//! the same `{code, message}` body so a caller never has to branch on
//! which route produced it.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::discovery::RegistryFilters;
use crate::error::A2aError;
use crate::push;
use crate::sse;
use crate::types::{json_rpc_error, json_rpc_success, JsonRpcRequest, Message};
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/.well-known/agent.json", get(agent_card_handler))
        .route("/a2a/health", get(health))
        .route("/a2a/skills", get(list_skills))
        .route("/a2a/skills/refresh", post(refresh_skills))
        .route("/a2a/tasks", post(create_task))
        .route("/a2a/tasks/{id}", get(get_task))
        .route("/a2a/tasks/{id}/cancel", post(cancel_task))
        .route("/a2a/tasks/{id}/stream", get(stream_task))
        .route("/a2a/tasks/{id}/message", post(append_task_message))
        .route("/a2a/callbacks/{id}", post(task_callback))
        .route("/a2a/agents", get(list_agents))
        .route("/a2a/agents/discover", post(discover_agents))
        .route("/a2a/orchestrate", post(orchestrate))
        .route("/a2a/orchestrate/plan", post(orchestrate_plan))
        .with_state(state)
}

/// Maps the error taxonomy onto HTTP status codes. JSON-RPC codes travel
/// in the body regardless; this only decides the transport-level status.
fn status_for(err: &A2aError) -> StatusCode {
    match err {
        A2aError::Parse(_) | A2aError::InvalidRequest(_) | A2aError::InvalidParams(_) => StatusCode::BAD_REQUEST,
        A2aError::MethodNotFound(_) | A2aError::TaskNotFound(_) | A2aError::SkillNotFound(_) => StatusCode::NOT_FOUND,
        A2aError::TaskInvalidState { .. } => StatusCode::CONFLICT,
        A2aError::AuthRequired => StatusCode::UNAUTHORIZED,
        A2aError::AuthForbidden(_) => StatusCode::FORBIDDEN,
        A2aError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        A2aError::Delegation(_) | A2aError::Transport(_) | A2aError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn rpc_error_response(id: Value, err: A2aError) -> Response {
    let status = status_for(&err);
    (status, Json(json_rpc_error(id, &err))).into_response()
}

#[derive(Debug, Deserialize)]
struct AgentCardQuery {
    format: Option<String>,
}

async fn agent_card_handler(State(state): State<Arc<AppState>>, Query(query): Query<AgentCardQuery>) -> Response {
    let card = state.cards.get_card(state.skills.get_all_skills());
    if query.format.as_deref() == Some("minimal") {
        let skill_ids: Vec<&str> = card.skills.iter().map(|s| s.id.as_str()).collect();
        Json(json!({
            "name": card.name,
            "url": card.url,
            "version": card.version,
            "skillCount": card.skills.len(),
            "skillIds": skill_ids,
            "capabilities": card.capabilities,
            "provider": card.provider,
        }))
        .into_response()
    } else {
        Json(card).into_response()
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let skills = state.skills.get_all_skills();
    let skill_count = skills.len();
    let card = state.cards.get_card(skills);
    let stats = state.store.stats().await;
    Json(json!({
        "status": "ok",
        "agent": card.name,
        "version": card.version,
        "uptime": state.started_at.elapsed().as_secs(),
        "tasks": stats,
        "skills": skill_count,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct SkillsQuery {
    q: Option<String>,
    category: Option<String>,
    limit: Option<usize>,
}

async fn list_skills(State(state): State<Arc<AppState>>, Query(query): Query<SkillsQuery>) -> Response {
    let tags: Vec<String> = query.category.into_iter().collect();
    let mut skills = state.skills.search_skills(query.q.as_deref().unwrap_or(""), &tags);
    if let Some(limit) = query.limit {
        skills.truncate(limit);
    }
    let total = skills.len();
    Json(json!({ "skills": skills, "total": total })).into_response()
}

async fn refresh_skills(State(state): State<Arc<AppState>>) -> Response {
    let count = state.skills.refresh_skills();
    Json(json!({ "refreshed": count })).into_response()
}

/// Handles both `tasks/send` and `tasks/sendSubscribe`. `tasks/send` runs
/// the skill to completion before responding and returns the final task;
/// `tasks/sendSubscribe` returns the just-created task immediately and
/// leaves the caller to attach to `GET /a2a/tasks/{id}/stream` for
/// progress.
async fn create_task(State(state): State<Arc<AppState>>, Json(req): Json<JsonRpcRequest>) -> Response {
    if req.jsonrpc != "2.0" {
        return rpc_error_response(req.id, A2aError::InvalidRequest("jsonrpc must be \"2.0\"".to_string()));
    }

    match req.method.as_str() {
        "tasks/send" | "tasks/sendSubscribe" => {
            let message: Message = match req.params.get("message").cloned() {
                Some(value) => match serde_json::from_value(value) {
                    Ok(m) => m,
                    Err(e) => return rpc_error_response(req.id, A2aError::InvalidParams(format!("message: {e}"))),
                },
                None => return rpc_error_response(req.id, A2aError::InvalidParams("params.message is required".to_string())),
            };
            let skill_id = req
                .params
                .get("skill")
                .and_then(|v| v.as_str())
                .unwrap_or("xactions.nlp_dispatch")
                .to_string();
            let params: HashMap<String, Value> = req
                .params
                .get("params")
                .and_then(|v| v.as_object())
                .map(|o| o.clone().into_iter().collect())
                .unwrap_or_default();
            let metadata: HashMap<String, Value> = req
                .params
                .get("metadata")
                .and_then(|v| v.as_object())
                .map(|o| o.clone().into_iter().collect())
                .unwrap_or_default();
            let context_id = req.params.get("contextId").and_then(|v| v.as_str()).map(|s| s.to_string());

            let task = state.store.create(message.clone(), metadata, context_id).await;

            let executor = state.executor.clone();
            let task_id = task.id.clone();
            let input = message.parts.clone();

            if req.method.as_str() == "tasks/send" {
                executor.run(task_id.clone(), skill_id, input, params).await;
                let task = state.store.get(&task_id).await.unwrap_or(task);
                let value = serde_json::to_value(&task).unwrap_or(Value::Null);
                return Json(json_rpc_success(req.id, value)).into_response();
            }

            tokio::spawn(async move {
                executor.run(task_id, skill_id, input, params).await;
            });

            let value = serde_json::to_value(&task).unwrap_or(Value::Null);
            Json(json_rpc_success(req.id, value)).into_response()
        }
        other => rpc_error_response(req.id, A2aError::MethodNotFound(other.to_string())),
    }
}

async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.store.get(&id).await {
        Some(task) => Json(task).into_response(),
        None => rpc_error_response(Value::Null, A2aError::TaskNotFound(id)),
    }
}

async fn cancel_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.store.cancel(&id).await {
        Ok(task) => Json(task).into_response(),
        Err(err) => rpc_error_response(Value::Null, err),
    }
}

async fn stream_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if state.store.get(&id).await.is_none() {
        return rpc_error_response(Value::Null, A2aError::TaskNotFound(id));
    }
    sse::task_event_stream(state.store.clone(), id).into_response()
}

async fn append_task_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(message): Json<Message>,
) -> Response {
    match state.store.append_message(&id, message).await {
        Ok(task) => Json(task).into_response(),
        Err(err) => rpc_error_response(Value::Null, err),
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    token: Option<String>,
}

/// Receives a push notification this agent subscribed to on a remote
/// peer. Token verification is the only gate — the payload is logged
/// rather than re-threaded into a local task, since a delegated step's
/// own polling loop (see `orchestrator::delegate`) is what actually
/// drives its outcome.
async fn task_callback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<CallbackQuery>,
    Json(body): Json<Value>,
) -> Response {
    let Some(token) = query.token else {
        return rpc_error_response(Value::Null, A2aError::AuthRequired);
    };
    if !push::verify_callback_token(&state.token_secret, &id, &token) {
        return rpc_error_response(Value::Null, A2aError::AuthForbidden("invalid callback token".to_string()));
    }
    log::info!("push callback for task {id}: {body}");
    Json(json!({ "received": true })).into_response()
}

async fn list_agents(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.list(&RegistryFilters::default()).await {
        Ok(agents) => {
            let total = agents.len();
            Json(json!({ "agents": agents, "total": total })).into_response()
        }
        Err(e) => rpc_error_response(Value::Null, A2aError::Internal(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct DiscoverRequest {
    urls: Vec<String>,
}

async fn discover_agents(State(state): State<Arc<AppState>>, Json(req): Json<DiscoverRequest>) -> Response {
    let results = futures_util::future::join_all(req.urls.into_iter().map(|url| {
        let state = state.clone();
        async move {
            match state.registry.register(&url).await {
                Ok(true) => {
                    let agent = state
                        .registry
                        .list(&RegistryFilters::default())
                        .await
                        .ok()
                        .and_then(|entries| entries.into_iter().find(|e| e.url == url));
                    json!({ "url": url, "status": "registered", "agent": agent })
                }
                Ok(false) => json!({
                    "url": url,
                    "status": "unreachable",
                    "error": "agent card fetch or validation failed",
                }),
                Err(e) => json!({ "url": url, "status": "error", "error": e.to_string() }),
            }
        }
    }))
    .await;
    Json(json!({ "results": results })).into_response()
}

#[derive(Debug, Deserialize)]
struct OrchestrateRequest {
    description: String,
}

async fn orchestrate(State(state): State<Arc<AppState>>, Json(req): Json<OrchestrateRequest>) -> Response {
    let result = state
        .orchestrator
        .run(&req.description, |event| {
            log::debug!("orchestration event: {event:?}");
        })
        .await;
    Json(json!({
        "success": result.success,
        "results": result.results,
        "artifacts": result.artifacts,
        "errors": result.errors,
    }))
    .into_response()
}

async fn orchestrate_plan(Json(req): Json<OrchestrateRequest>) -> Response {
    let steps = crate::orchestrator::decompose(&req.description);
    let preview = crate::orchestrator::plan(&req.description);
    let steps_json: Vec<Value> = steps
        .iter()
        .enumerate()
        .map(|(index, step)| json!({ "index": index, "skill": step.skill, "label": step.label, "deps": step.deps }))
        .collect();
    Json(json!({
        "steps": steps_json,
        "parallel": preview.parallel,
        "sequential": preview.sequential,
        "totalSteps": preview.total_steps,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_card::AgentCardOptions;
    use crate::auth::credentials::{CredentialService, OutboundCredentialStore};
    use crate::auth::keys::{ApiKeyStore, KeyService};
    use crate::bridge::{Bridge, LocalBridge};
    use crate::config::Config;
    use crate::discovery::registry::AgentRegistryStore;
    use crate::discovery::trust::TrustStore;
    use crate::discovery::{AgentRegistry, TrustScorer};
    use crate::orchestrator::Orchestrator;
    use crate::push::SubscriptionManager;
    use crate::skills::{SkillRegistry, StaticCatalog};
    use crate::storage::InMemoryRepository;
    use crate::tasks::{Executor, TaskStore};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Instant;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let store = Arc::new(TaskStore::new(100));
        let bridge: Arc<dyn Bridge> = Arc::new(LocalBridge);
        let executor = Arc::new(Executor::new(store.clone(), bridge.clone()));
        let skills = Arc::new(SkillRegistry::new(Arc::new(StaticCatalog)));
        let cards = Arc::new(crate::agent_card::AgentCardService::new(AgentCardOptions::default()));
        let registry = Arc::new(AgentRegistry::new(
            Arc::new(InMemoryRepository::<AgentRegistryStore>::new()),
            cards.clone(),
        ));
        let trust = Arc::new(TrustScorer::new(Arc::new(InMemoryRepository::<TrustStore>::new())));
        let orchestrator = Arc::new(Orchestrator::new(skills.clone(), bridge.clone(), registry.clone(), trust.clone()));
        let subscriptions = Arc::new(SubscriptionManager::new(b"test-secret".to_vec()));
        let keys = Arc::new(KeyService::new(Arc::new(InMemoryRepository::<ApiKeyStore>::new())));
        let credentials = Arc::new(CredentialService::new(Arc::new(InMemoryRepository::<OutboundCredentialStore>::new())));

        Arc::new(AppState {
            config: Config::default(),
            store,
            executor,
            bridge,
            skills,
            cards,
            registry,
            trust,
            orchestrator,
            subscriptions,
            keys,
            credentials,
            token_secret: b"test-secret".to_vec(),
            started_at: Instant::now(),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_then_fetch_task_round_trips() {
        let app = router(test_state());
        let body = json!({
            "jsonrpc": "2.0",
            "method": "tasks/send",
            "params": { "message": { "role": "user", "parts": [{"type": "text", "text": "hi"}] }, "skill": "xactions.x_echo" },
            "id": 1,
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/a2a/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let envelope = body_json(response).await;
        let task_id = envelope["result"]["id"].as_str().unwrap().to_string();

        let fetched = app
            .oneshot(Request::builder().uri(format!("/a2a/tasks/{task_id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        let task = body_json(fetched).await;
        assert_eq!(task["id"], task_id);
    }

    #[tokio::test]
    async fn tasks_send_awaits_completion_and_returns_final_task() {
        let app = router(test_state());
        let body = json!({
            "jsonrpc": "2.0",
            "method": "tasks/send",
            "params": { "message": { "role": "user", "parts": [{"type": "text", "text": "hi"}] }, "skill": "xactions.x_echo" },
            "id": 1,
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/a2a/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let envelope = body_json(response).await;
        assert_eq!(envelope["result"]["status"]["state"], "completed");
    }

    #[tokio::test]
    async fn tasks_send_subscribe_returns_submitted_task_immediately() {
        let app = router(test_state());
        let body = json!({
            "jsonrpc": "2.0",
            "method": "tasks/sendSubscribe",
            "params": { "message": { "role": "user", "parts": [{"type": "text", "text": "hi"}] }, "skill": "xactions.x_echo" },
            "id": 1,
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/a2a/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let envelope = body_json(response).await;
        assert_eq!(envelope["result"]["status"]["state"], "submitted");
    }

    #[tokio::test]
    async fn unknown_task_returns_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/a2a/tasks/does-not-exist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_on_submitted_task_then_rejects_second_cancel() {
        let state = test_state();
        let task = state.store.create(Message::user_text("hi"), HashMap::new(), None).await;
        let app = router(state);

        let first = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/a2a/tasks/{}/cancel", task.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/a2a/tasks/{}/cancel", task.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_jsonrpc_method_is_rejected() {
        let app = router(test_state());
        let body = json!({ "jsonrpc": "2.0", "method": "tasks/bogus", "params": {}, "id": 7 });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/a2a/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let envelope = body_json(response).await;
        assert_eq!(envelope["error"]["code"], json!(crate::error::code::METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn skills_listing_honors_limit() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/a2a/skills?limit=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["skills"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn agent_card_default_route_includes_skills() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/.well-known/agent.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(!body["skills"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn agent_card_minimal_format_reports_skill_count_and_ids() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/.well-known/agent.json?format=minimal")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let ids = body["skillIds"].as_array().unwrap();
        assert_eq!(body["skillCount"], json!(ids.len()));
        assert!(!ids.is_empty());
        assert!(body["provider"].is_object());
        assert!(body["capabilities"].is_object());
        assert!(body.get("description").is_none());
    }

    #[tokio::test]
    async fn health_reports_agent_version_tasks_and_skills() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/a2a/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["agent"].is_string());
        assert!(body["version"].is_string());
        assert!(body["tasks"]["total"].is_number());
        assert!(body["skills"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn invalid_bearer_token_is_rejected_on_any_route() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/a2a/health")
                    .header("authorization", "Bearer not-a-real-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], json!(crate::error::code::AUTH_REQUIRED));
    }

    #[tokio::test]
    async fn orchestrate_plan_reports_step_shape() {
        let app = router(test_state());
        let body = json!({ "description": "compare alice and bob" });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/a2a/orchestrate/plan")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["totalSteps"], json!(3));
        assert_eq!(body["sequential"], json!([2]));
    }
}
