//! Core A2A types: task state machine, messages, parts, and the JSON-RPC
//! envelope shared by every route in [`crate::server`].
//!
//! The transition table lives here as a static declaration rather than
//! scattered `match` arms, so [`tasks::store::TaskStore::transition`] has a
//! single place to consult.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// Terminal states are absorbing: no further transition is permitted.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }

    /// The valid successor states for this state.
    pub fn allowed_successors(self) -> &'static [TaskState] {
        match self {
            TaskState::Submitted => &[TaskState::Working, TaskState::Canceled],
            TaskState::Working => &[
                TaskState::Completed,
                TaskState::Failed,
                TaskState::Canceled,
                TaskState::InputRequired,
            ],
            TaskState::InputRequired => &[TaskState::Working, TaskState::Canceled],
            TaskState::Completed | TaskState::Failed | TaskState::Canceled => &[],
        }
    }

    pub fn can_transition_to(self, next: TaskState) -> bool {
        self.allowed_successors().contains(&next)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// Human-readable status attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TaskStatus {
    pub fn new(state: TaskState, message: Option<String>) -> Self {
        Self {
            state,
            message,
            timestamp: Utc::now(),
        }
    }
}

/// One entry in a task's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Role of the party that authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// A tagged-sum content fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    Text {
        text: String,
    },
    Data {
        data: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    File {
        name: String,
        mime_type: String,
        #[serde(flatten)]
        content: FileContent,
    },
}

/// Exactly one of URI or base64 bytes, per invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    Uri { uri: String },
    Bytes { bytes: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn data(data: serde_json::Value) -> Self {
        Part::Data {
            data,
            mime_type: None,
        }
    }

    pub fn data_with_mime(data: serde_json::Value, mime_type: impl Into<String>) -> Self {
        Part::Data {
            data,
            mime_type: Some(mime_type.into()),
        }
    }

    pub fn file_uri(name: impl Into<String>, mime_type: impl Into<String>, uri: impl Into<String>) -> Self {
        Part::File {
            name: name.into(),
            mime_type: mime_type.into(),
            content: FileContent::Uri { uri: uri.into() },
        }
    }

    pub fn error(error: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        let mut obj = serde_json::Map::new();
        obj.insert("error".to_string(), serde_json::Value::String(error.into()));
        if let Some(d) = details {
            obj.insert("details".to_string(), d);
        }
        Part::Data {
            data: serde_json::Value::Object(obj),
            mime_type: None,
        }
    }
}

/// A structured message exchanged during a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            parts: vec![Part::text(text)],
            metadata: HashMap::new(),
        }
    }

    pub fn agent_text(text: impl Into<String>) -> Self {
        Message {
            role: Role::Agent,
            parts: vec![Part::text(text)],
            metadata: HashMap::new(),
        }
    }

    /// Concatenates every `Text` part into one string; used by the
    /// orchestrator's pattern-matching decomposition step.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------
// JSON-RPC 2.0 envelope
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcSuccess {
    pub jsonrpc: &'static str,
    pub result: serde_json::Value,
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcFailure {
    pub jsonrpc: &'static str,
    pub error: crate::error::JsonRpcErrorBody,
    pub id: serde_json::Value,
}

pub fn json_rpc_success(id: serde_json::Value, result: serde_json::Value) -> JsonRpcSuccess {
    JsonRpcSuccess {
        jsonrpc: "2.0",
        result,
        id,
    }
}

pub fn json_rpc_error(id: serde_json::Value, error: &crate::error::A2aError) -> JsonRpcFailure {
    JsonRpcFailure {
        jsonrpc: "2.0",
        error: error.into(),
        id,
    }
}
