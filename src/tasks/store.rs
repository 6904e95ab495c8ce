//! In-memory task storage.
//!
//! Grounded in the base crate's preference for `Arc<RwLock<_>>`-guarded
//! registries (`tool_protocol::ToolRegistry`, `orchestration::Orchestration`
//! agent lists) rather than a database. Per-task mutations are serialized
//! by a per-task `tokio::sync::Mutex` so that `transition`,
//! `append_message`, and `append_artifact` are linearizable and event
//! emission order equals commit order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::bridge::CancellationToken;
use crate::error::A2aError;
use crate::tasks::events::{new_bus, TaskEvent, EVENT_CHANNEL_CAPACITY};
use crate::types::{HistoryEntry, Message, Part, TaskState, TaskStatus};

/// A task, as returned to HTTP callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    pub messages: Vec<Message>,
    pub artifacts: Vec<Part>,
    pub history: Vec<HistoryEntry>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Internal record: the task plus the plumbing the store needs but never
/// serializes to callers (cancellation token, per-task lock).
struct TaskRecord {
    task: Task,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskStats {
    pub total: usize,
    pub by_state: HashMap<String, usize>,
}

/// The task store: one entry per task, a cancellation token per task, and
/// a single global broadcast bus that every [`TaskEvent`] is published on.
/// SSE and push subscribers filter by task id; because
/// `broadcast::Receiver` only yields events sent *after* subscription,
/// late-attaching clients naturally never see stale events.
pub struct TaskStore {
    tasks: RwLock<HashMap<String, Arc<Mutex<TaskRecord>>>>,
    order: RwLock<Vec<String>>,
    cancel_tokens: RwLock<HashMap<String, CancellationToken>>,
    events_tx: broadcast::Sender<TaskEvent>,
    max_tasks: usize,
}

impl TaskStore {
    pub fn new(max_tasks: usize) -> Self {
        let (events_tx, _rx) = new_bus();
        Self {
            tasks: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            cancel_tokens: RwLock::new(HashMap::new()),
            events_tx,
            max_tasks,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: TaskEvent) {
        // A send error only means there are currently no subscribers; that
        // is not a failure condition for the store.
        let _ = self.events_tx.send(event);
    }

    pub async fn create(
        &self,
        message: Message,
        metadata: HashMap<String, serde_json::Value>,
        context_id: Option<String>,
    ) -> Task {
        let id = Uuid::new_v4().to_string();
        let context_id = context_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let status = TaskStatus::new(TaskState::Submitted, None);
        let history = vec![HistoryEntry {
            state: TaskState::Submitted,
            message: None,
            timestamp: status.timestamp,
        }];
        let task = Task {
            id: id.clone(),
            context_id,
            status,
            messages: vec![message],
            artifacts: Vec::new(),
            history,
            metadata,
        };

        {
            let mut tasks = self.tasks.write().await;
            tasks.insert(id.clone(), Arc::new(Mutex::new(TaskRecord { task: task.clone() })));
        }
        self.order.write().await.push(id.clone());
        self.cancel_tokens
            .write()
            .await
            .insert(id.clone(), CancellationToken::new());

        self.enforce_capacity().await;
        log::info!("task {id} created in state submitted");
        task
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        let tasks = self.tasks.read().await;
        let record = tasks.get(id)?.clone();
        drop(tasks);
        let guard = record.lock().await;
        Some(guard.task.clone())
    }

    pub async fn cancellation_token(&self, id: &str) -> Option<CancellationToken> {
        self.cancel_tokens.read().await.get(id).cloned()
    }

    async fn with_record<F, R>(&self, id: &str, f: F) -> Result<R, A2aError>
    where
        F: FnOnce(&mut Task) -> Result<R, A2aError>,
    {
        let record = {
            let tasks = self.tasks.read().await;
            tasks
                .get(id)
                .cloned()
                .ok_or_else(|| A2aError::TaskNotFound(id.to_string()))?
        };
        let mut guard = record.lock().await;
        f(&mut guard.task)
    }

    pub async fn transition(
        &self,
        id: &str,
        new_state: TaskState,
        message: Option<String>,
    ) -> Result<Task, A2aError> {
        let (task, event, done_event) = self
            .with_record(id, |task| {
                let current = task.status.state;
                if current.is_terminal() || !current.can_transition_to(new_state) {
                    return Err(A2aError::TaskInvalidState {
                        task_id: id.to_string(),
                        from: current.to_string(),
                        to: new_state.to_string(),
                    });
                }
                let timestamp = Utc::now();
                task.status = TaskStatus {
                    state: new_state,
                    message: message.clone(),
                    timestamp,
                };
                task.history.push(HistoryEntry {
                    state: new_state,
                    message: message.clone(),
                    timestamp,
                });
                let event = TaskEvent::Transition {
                    task_id: id.to_string(),
                    state: new_state,
                    previous_state: current,
                    message: message.clone(),
                    timestamp,
                };
                let done_event = new_state.is_terminal().then(|| TaskEvent::Done {
                    task_id: id.to_string(),
                    final_state: new_state,
                });
                Ok((task.clone(), event, done_event))
            })
            .await?;

        // Listeners are invoked outside the per-task lock — `with_record` has already dropped its guard by
        // the time we get here.
        self.emit(event);
        if let Some(done) = done_event {
            self.emit(done);
        }
        Ok(task)
    }

    pub async fn append_message(&self, id: &str, message: Message) -> Result<Task, A2aError> {
        let (task, event) = self
            .with_record(id, |task| {
                if task.status.state.is_terminal() {
                    return Err(A2aError::TaskInvalidState {
                        task_id: id.to_string(),
                        from: task.status.state.to_string(),
                        to: "message-append".to_string(),
                    });
                }
                task.messages.push(message.clone());
                let event = crate::tasks::events::message_event(id, &message);
                Ok((task.clone(), event))
            })
            .await?;
        self.emit(event);
        Ok(task)
    }

    pub async fn append_artifact(&self, id: &str, part: Part) -> Result<Task, A2aError> {
        let (task, event) = self
            .with_record(id, |task| {
                task.artifacts.push(part.clone());
                let index = task.artifacts.len() - 1;
                let event = TaskEvent::Artifact {
                    task_id: id.to_string(),
                    artifact_index: index,
                    part,
                };
                Ok((task.clone(), event))
            })
            .await?;
        self.emit(event);
        Ok(task)
    }

    /// Cancel a task from any non-terminal state.
    pub async fn cancel(&self, id: &str) -> Result<Task, A2aError> {
        let current_state = {
            let tasks = self.tasks.read().await;
            let record = tasks
                .get(id)
                .ok_or_else(|| A2aError::TaskNotFound(id.to_string()))?
                .clone();
            drop(tasks);
            let state = record.lock().await.task.status.state;
            state
        };
        if current_state.is_terminal() {
            return Err(A2aError::TaskInvalidState {
                task_id: id.to_string(),
                from: current_state.to_string(),
                to: TaskState::Canceled.to_string(),
            });
        }
        if let Some(token) = self.cancellation_token(id).await {
            token.cancel();
        }
        self.transition(id, TaskState::Canceled, Some("canceled by caller".to_string()))
            .await
    }

    pub async fn stats(&self) -> TaskStats {
        let tasks = self.tasks.read().await;
        let mut by_state: HashMap<String, usize> = HashMap::new();
        for record in tasks.values() {
            let state = record.lock().await.task.status.state.to_string();
            *by_state.entry(state).or_insert(0) += 1;
        }
        TaskStats {
            total: tasks.len(),
            by_state,
        }
    }

    /// Evicts the oldest terminal tasks once the store exceeds `max_tasks`.
    async fn enforce_capacity(&self) {
        let over = {
            let order = self.order.read().await;
            order.len().saturating_sub(self.max_tasks)
        };
        if over == 0 {
            return;
        }
        let mut order = self.order.write().await;
        let mut tasks = self.tasks.write().await;
        let mut evicted = 0;
        let mut remaining = Vec::with_capacity(order.len());
        for id in order.drain(..) {
            if evicted >= over {
                remaining.push(id);
                continue;
            }
            let is_terminal = match tasks.get(&id) {
                Some(record) => record.try_lock().map(|g| g.task.status.state.is_terminal()).unwrap_or(false),
                None => true,
            };
            if is_terminal {
                tasks.remove(&id);
                self.cancel_tokens.write().await.remove(&id);
                evicted += 1;
            } else {
                remaining.push(id);
            }
        }
        *order = remaining;
    }
}
