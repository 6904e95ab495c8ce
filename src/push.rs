//! Push-notification subsystem: HMAC-signed callback URL
//! generation/verification and outbound webhook delivery with a
//! subscription registry.
//!
//! The retry/backoff loop mirrors the orchestrator's delegation retry:
//! exponential backoff over a capped attempt count, with non-retryable
//! failures (client error responses) short-circuiting immediately.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::tasks::events::TaskEvent;

type HmacSha256 = Hmac<Sha256>;

const MAX_RETRIES: u32 = 3;

fn hmac_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds the callback path `/a2a/callbacks/{task_id}?token=...` whose
/// token is `HMAC-SHA256(secret, task_id)`.
pub fn callback_path(secret: &[u8], task_id: &str) -> String {
    let token = hmac_hex(secret, task_id.as_bytes());
    format!("/a2a/callbacks/{task_id}?token={token}")
}

/// Verifies an inbound callback token in constant time.
pub fn verify_callback_token(secret: &[u8], task_id: &str, presented_token: &str) -> bool {
    let expected = hmac_hex(secret, task_id.as_bytes());
    let matches: bool = expected.as_bytes().ct_eq(presented_token.as_bytes()).into();
    matches
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    State,
    Progress,
    Result,
    Error,
}

#[derive(Debug, Serialize)]
pub struct NotificationBody {
    pub task_id: String,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl NotificationBody {
    pub fn from_task_event(event: &TaskEvent) -> Self {
        let now = chrono::Utc::now();
        match event {
            TaskEvent::Transition { task_id, state, message, timestamp, .. } => NotificationBody {
                task_id: task_id.clone(),
                kind: if state.is_terminal() && *state != crate::types::TaskState::Completed {
                    NotificationKind::Error
                } else {
                    NotificationKind::State
                },
                payload: serde_json::json!({ "state": state.to_string(), "message": message }),
                timestamp: *timestamp,
            },
            TaskEvent::Done { task_id, final_state } => NotificationBody {
                task_id: task_id.clone(),
                kind: NotificationKind::Result,
                payload: serde_json::json!({ "state": final_state.to_string() }),
                timestamp: now,
            },
            TaskEvent::Message { task_id, role, parts } => NotificationBody {
                task_id: task_id.clone(),
                kind: NotificationKind::Progress,
                payload: serde_json::json!({ "role": role, "parts": parts }),
                timestamp: now,
            },
            TaskEvent::Artifact { task_id, artifact_index, part } => NotificationBody {
                task_id: task_id.clone(),
                kind: NotificationKind::Progress,
                payload: serde_json::json!({ "artifact_index": artifact_index, "part": part }),
                timestamp: now,
            },
        }
    }
}

/// Delivers a signed webhook with exponential backoff on 5xx/transport
/// failures; 4xx responses give up immediately.
pub async fn deliver(http: &reqwest::Client, secret: &[u8], url: &str, body: &NotificationBody) -> bool {
    let payload = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = hmac_hex(secret, &payload);

    for attempt in 0..=MAX_RETRIES {
        let response = http
            .post(url)
            .header("X-XActions-Signature", &signature)
            .header("Content-Type", "application/json")
            .body(payload.clone())
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => return true,
            Ok(resp) if resp.status().is_client_error() => return false,
            _ => {
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(Duration::from_secs(1u64 << attempt)).await;
                }
            }
        }
    }
    false
}

/// Maintains `task_id -> set<callback URL>` and fans out notifications
/// to every subscriber concurrently. Subscriptions are auto-retired
/// once a task's terminal notification has been delivered.
pub struct SubscriptionManager {
    subscriptions: RwLock<HashMap<String, HashSet<String>>>,
    http: reqwest::Client,
    secret: Vec<u8>,
}

impl SubscriptionManager {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            http: reqwest::Client::new(),
            secret,
        }
    }

    pub async fn subscribe(&self, task_id: &str, callback_url: &str) {
        self.subscriptions
            .write()
            .await
            .entry(task_id.to_string())
            .or_default()
            .insert(callback_url.to_string());
    }

    pub async fn unsubscribe(&self, task_id: &str) {
        self.subscriptions.write().await.remove(task_id);
    }

    pub async fn subscriber_count(&self, task_id: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .get(task_id)
            .map(|urls| urls.len())
            .unwrap_or(0)
    }

    /// Posts `event` to every subscriber of its task concurrently;
    /// retires the subscription once a terminal `Done` event has been
    /// delivered.
    pub async fn notify(&self, event: &TaskEvent) {
        let task_id = event.task_id().to_string();

        let urls: Vec<String> = {
            let subs = self.subscriptions.read().await;
            match subs.get(&task_id) {
                Some(urls) => urls.iter().cloned().collect(),
                None => return,
            }
        };

        let body = NotificationBody::from_task_event(event);
        let deliveries = urls.into_iter().map(|url| {
            let http = self.http.clone();
            let secret = self.secret.clone();
            let body = body.clone();
            async move { deliver(&http, &secret, &url, &body).await }
        });
        futures_util::future::join_all(deliveries).await;

        if matches!(event, TaskEvent::Done { .. }) {
            self.unsubscribe(&task_id).await;
        }
    }
}

impl Clone for NotificationBody {
    fn clone(&self) -> Self {
        NotificationBody {
            task_id: self.task_id.clone(),
            kind: self.kind.clone(),
            payload: self.payload.clone(),
            timestamp: self.timestamp,
        }
    }
}
