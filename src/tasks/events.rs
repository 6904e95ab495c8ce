//! Task event types and the per-task broadcast bus.
//!
//! The task store publishes a typed [`TaskEvent`] value on a
//! `tokio::sync::broadcast` channel per task. SSE clients and push
//! subscribers both subscribe to the same bus, so commit order is
//! observed identically by every listener.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Message, Part, TaskState};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TaskEvent {
    Transition {
        task_id: String,
        state: TaskState,
        previous_state: TaskState,
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Done {
        task_id: String,
        final_state: TaskState,
    },
    Message {
        task_id: String,
        role: crate::types::Role,
        parts: Vec<Part>,
    },
    Artifact {
        task_id: String,
        artifact_index: usize,
        part: Part,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Transition { task_id, .. }
            | TaskEvent::Done { task_id, .. }
            | TaskEvent::Message { task_id, .. }
            | TaskEvent::Artifact { task_id, .. } => task_id,
        }
    }
}

/// Default channel capacity; a lagging subscriber (e.g. a disconnected SSE
/// reader that hasn't been pruned yet) drops the oldest events rather than
/// blocking the task's writer.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub fn new_bus() -> (
    tokio::sync::broadcast::Sender<TaskEvent>,
    tokio::sync::broadcast::Receiver<TaskEvent>,
) {
    tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

/// Helper retained for call sites that construct a message-appended event
/// directly from a [`Message`] rather than its decomposed fields.
pub fn message_event(task_id: &str, message: &Message) -> TaskEvent {
    TaskEvent::Message {
        task_id: task_id.to_string(),
        role: message.role,
        parts: message.parts.clone(),
    }
}
