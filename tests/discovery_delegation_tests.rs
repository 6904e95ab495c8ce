//! Registers a second, genuinely separate A2A server as a remote agent
//! and delegates a skill call to it over real HTTP, end to end: card
//! fetch, registration, delegation, polling, and trust crediting.

mod common;

use std::net::SocketAddr;

#[tokio::test]
async fn remote_agent_is_discovered_and_delegation_succeeds() {
    let remote_state = common::test_state();
    let remote_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr: SocketAddr = remote_listener.local_addr().unwrap();
    let remote_app = common::router(remote_state);
    tokio::spawn(async move {
        axum::serve(remote_listener, remote_app.into_make_service()).await.unwrap();
    });
    let remote_url = format!("http://{remote_addr}");

    let local_state = common::test_state();

    let registered = local_state.registry.register(&remote_url).await.unwrap();
    assert!(registered, "card fetch against the live remote server should succeed");

    let entries = local_state
        .registry
        .list(&xactions_a2a::discovery::RegistryFilters::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].url, remote_url);
    assert!(entries[0].healthy);

    let params = std::collections::HashMap::new();
    let outcome = local_state
        .orchestrator
        .delegate_with_fallback(&[remote_url.clone()], "xactions.x_echo", &params)
        .await;
    assert!(outcome.is_ok(), "delegation should complete once the remote task finishes: {outcome:?}");

    // The successful round trip should have credited the remote's trust
    // score above the neutral default for an unknown agent.
    let score = local_state.trust.score(&remote_url).await.unwrap();
    assert!(score > 50, "a successful delegation should raise trust above the neutral baseline, got {score}");
}

#[tokio::test]
async fn discover_endpoint_reports_unreachable_for_a_dead_url() {
    let state = common::test_state();
    let app = common::router(state);

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    let body = serde_json::json!({ "urls": ["http://127.0.0.1:1"] });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/a2a/agents/discover")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let results = value["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_ne!(results[0]["status"], "registered");
}
