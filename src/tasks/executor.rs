//! Execution driver: drives a single task to completion by invoking the
//! [`Bridge`].
//!
//! Bridge errors are always caught and converted into a `failed`
//! transition — they never propagate as process-level panics.
//! Cancellation observed mid-flight must not clobber a task that the
//! store already moved to `canceled`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bridge::{Bridge, BridgeError};
use crate::tasks::store::TaskStore;
use crate::types::{Part, TaskState};

pub struct Executor {
    store: Arc<TaskStore>,
    bridge: Arc<dyn Bridge>,
}

impl Executor {
    pub fn new(store: Arc<TaskStore>, bridge: Arc<dyn Bridge>) -> Self {
        Self { store, bridge }
    }

    /// Runs `task_id` to completion. Callers that want several tasks
    /// executing in parallel should `tokio::spawn` this; callers that need
    /// the final task back (`tasks/send`) should await it directly.
    pub async fn run(&self, task_id: String, skill_id: String, input: Vec<Part>, params: HashMap<String, serde_json::Value>) {
        if !self.bridge.supports(&skill_id) {
            log::warn!("task {task_id} references unknown skill {skill_id}");
            let _ = self
                .store
                .append_artifact(&task_id, Part::error(format!("unknown skill: {skill_id}"), None))
                .await;
            let _ = self
                .store
                .transition(&task_id, TaskState::Failed, Some(format!("unknown skill: {skill_id}")))
                .await;
            return;
        }

        if let Err(e) = self.store.transition(&task_id, TaskState::Working, None).await {
            log::warn!("task {task_id} could not start: {e}");
            return;
        }

        let cancel = match self.store.cancellation_token(&task_id).await {
            Some(token) => token,
            None => return,
        };

        let result = self.bridge.invoke(&skill_id, input, params, cancel).await;

        match result {
            Ok(output) => {
                for part in output.artifacts {
                    let _ = self.store.append_artifact(&task_id, part).await;
                }
                // A concurrent cancel() may have already moved the task to
                // `canceled`; transition() rejects the stale `completed`
                // attempt and we must not clobber that outcome.
                if let Err(e) = self
                    .store
                    .transition(&task_id, TaskState::Completed, output.summary)
                    .await
                {
                    log::debug!("task {task_id} already left working state: {e}");
                }
            }
            Err(BridgeError::Canceled) => {
                log::info!("task {task_id} bridge call observed cancellation");
                // The store is already `canceled` (that's what flipped the
                // token); nothing further to do.
            }
            Err(e) => {
                log::warn!("task {task_id} bridge call failed: {e}");
                let _ = self
                    .store
                    .append_artifact(&task_id, Part::error(e.to_string(), None))
                    .await;
                if let Err(transition_err) = self
                    .store
                    .transition(&task_id, TaskState::Failed, Some(e.to_string()))
                    .await
                {
                    log::debug!("task {task_id} already left working state: {transition_err}");
                }
            }
        }
    }
}
