//! Canceling a task mid-flight stops it in `canceled`, and a second
//! cancel attempt is rejected since the state is already terminal.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn cancel_mid_flight_then_rejects_second_cancel() {
    let state = common::test_state();
    let app = common::router(state);

    let body = json!({
        "jsonrpc": "2.0",
        "method": "tasks/sendSubscribe",
        "params": {
            "message": { "role": "user", "parts": [{ "type": "text", "text": "hold on" }] },
            "skill": "xactions.x_delay",
            "params": { "millis": 5_000 },
        },
        "id": "a",
    });

    let create_response = app
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
    let envelope = body_json(create_response).await;
    let task_id = envelope["result"]["id"].as_str().unwrap().to_string();

    // Give the executor a moment to move the task to `working` before
    // canceling, exercising the mid-flight path rather than a cancel
    // that races the initial transition.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let cancel_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/a2a/tasks/{task_id}/cancel"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cancel_response.status(), StatusCode::OK);
    let canceled = body_json(cancel_response).await;
    assert_eq!(canceled["status"]["state"], "canceled");

    let second_cancel = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/a2a/tasks/{task_id}/cancel"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second_cancel.status(), StatusCode::CONFLICT);
    let err = body_json(second_cancel).await;
    assert_eq!(err["error"]["code"], -32002);
}
