//! Server-sent events: turns the task store's broadcast bus into a
//! per-task `axum` SSE response.
//!
//! Each client subscribes to the global bus and filters by task id
//! client-side rather than the store maintaining per-task channels;
//! the bus is already ordered per task, so this keeps the store's
//! fan-out logic in one place.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

use crate::tasks::{TaskEvent, TaskStore};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Builds the SSE response for `GET /a2a/tasks/{id}/stream`.
///
/// Replays nothing: a client that subscribes after a task has already
/// finished receives no further events. The stream ends right after it
/// forwards the task's terminal `Done` event.
pub fn task_event_stream(
    store: Arc<TaskStore>,
    task_id: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = store.subscribe();
    let filtered = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |item| match item {
        Ok(event) if event.task_id() == task_id => Some(event),
        _ => None,
    });

    let stream = stream::unfold((filtered, false), |(mut source, done)| async move {
        if done {
            return None;
        }
        let event = source.next().await?;
        let is_done = matches!(event, TaskEvent::Done { .. });
        Some((to_sse_event(event), (source, is_done)))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
}

fn to_sse_event(event: TaskEvent) -> Result<Event, Infallible> {
    let name = match &event {
        TaskEvent::Transition { .. } => "status",
        TaskEvent::Done { .. } => "done",
        TaskEvent::Message { .. } => "message",
        TaskEvent::Artifact { .. } => "artifact",
    };
    let payload = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
    Ok(Event::default().event(name).data(payload.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, TaskState};
    use std::collections::HashMap;
    use tokio_stream::StreamExt as _;

    #[tokio::test]
    async fn stream_closes_after_done_event() {
        let store = Arc::new(TaskStore::new(100));
        let task = store.create(Message::user_text("hi"), HashMap::new(), None).await;

        let stream = task_event_stream(store.clone(), task.id.clone());
        let handle = tokio::spawn(async move {
            let events: Vec<_> = stream.take(10).collect().await;
            events.len()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.transition(&task.id, TaskState::Working, None).await.unwrap();
        store.transition(&task.id, TaskState::Completed, None).await.unwrap();

        let count = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("stream should close once the task reaches a terminal state")
            .unwrap();
        assert_eq!(count, 2);
    }
}
