//! The bridge contract: the narrow interface the core uses to
//! actually *do* work, without knowing how a skill is implemented.
//!
//! Grounded in the base crate's `ToolProtocol` trait
//! (`tool_protocol.rs`): a small async trait that a local in-process
//! implementation and a remote HTTP-backed implementation can both
//! satisfy, so the executor and orchestrator never branch on
//! "local vs remote" themselves.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::types::Part;

/// Cooperative cancellation signal handed to a running bridge call.
///
/// The executor flips this when a task is canceled mid-flight; a bridge
/// implementation should poll it at I/O boundaries and abort early.
#[derive(Clone, Default)]
pub struct CancellationToken {
    notify: Arc<Notify>,
    canceled: Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub async fn canceled(&self) {
        if self.is_canceled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// The outcome of a bridge invocation.
#[derive(Debug, Clone, Default)]
pub struct BridgeOutput {
    pub artifacts: Vec<Part>,
    pub summary: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("unknown skill: {0}")]
    UnknownSkill(String),
    #[error("bridge call timed out")]
    Timeout,
    #[error("bridge call canceled")]
    Canceled,
    #[error("bridge call failed: {0}")]
    Failed(String),
}

/// Executes a single skill invocation, locally or remotely.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn invoke(
        &self,
        skill_id: &str,
        input: Vec<Part>,
        params: HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<BridgeOutput, BridgeError>;

    /// Whether this bridge can handle the given skill at all, independent
    /// of whether the call would succeed (used by the executor to
    /// fast-fail unknown skills before invoking them).
    fn supports(&self, skill_id: &str) -> bool;
}

/// A deterministic, in-process [`Bridge`] used by tests, examples, and as
/// the default when no external tool executor is wired up. It implements
/// a handful of illustrative skills (`echo`, `delay`, `fail`) purely to
/// exercise the executor/SSE/push paths end-to-end — it does not stand in
/// for the real, out-of-scope social-platform tool executor.
pub struct LocalBridge;

#[async_trait]
impl Bridge for LocalBridge {
    async fn invoke(
        &self,
        skill_id: &str,
        input: Vec<Part>,
        params: HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<BridgeOutput, BridgeError> {
        match skill_id {
            "xactions.x_echo" => {
                let text = input
                    .iter()
                    .find_map(|p| match p {
                        Part::Text { text } => Some(text.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                Ok(BridgeOutput {
                    artifacts: vec![Part::data(serde_json::json!({ "echo": text }))],
                    summary: Some(text),
                })
            }
            "xactions.x_delay" => {
                let millis = params
                    .get("millis")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(50);
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_millis(millis)) => {
                        Ok(BridgeOutput {
                            artifacts: vec![Part::data(serde_json::json!({ "slept_ms": millis }))],
                            summary: None,
                        })
                    }
                    _ = cancel.canceled() => Err(BridgeError::Canceled),
                }
            }
            "xactions.x_fail" => Err(BridgeError::Failed(
                params
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("forced failure")
                    .to_string(),
            )),
            other => Err(BridgeError::UnknownSkill(other.to_string())),
        }
    }

    fn supports(&self, skill_id: &str) -> bool {
        matches!(
            skill_id,
            "xactions.x_echo" | "xactions.x_delay" | "xactions.x_fail"
        )
    }
}
