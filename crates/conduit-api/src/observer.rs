// ObserverManager (§4.10, §5): one bounded, cursored event queue per active
// session. Observers are created lazily at session start for every mode —
// including orchestrator/workflow, where a prior defect skipped this — and
// drained and removed on session stop/complete.

use std::collections::HashMap;
use std::sync::Arc;

use conduit_contracts::Event;
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

/// Batch size cap for one `GET /api/events` poll response (§6 "batch size capped").
pub const DEFAULT_POLL_BATCH_SIZE: usize = 100;

struct ObserverState {
    session_id: Uuid,
    events: Vec<Event>,
    completed: bool,
    notify: Arc<Notify>,
}

/// A per-session cursored event queue; `cursor` is a 1-based offset into
/// `events` so that `next_cursor` can be handed straight back by the client
/// on its next poll without the server tracking per-client state.
#[derive(Clone)]
pub struct Observer {
    id: Uuid,
    state: Arc<RwLock<ObserverState>>,
}

impl Observer {
    fn new(session_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            state: Arc::new(RwLock::new(ObserverState {
                session_id,
                events: Vec::new(),
                completed: false,
                notify: Arc::new(Notify::new()),
            })),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    async fn push(&self, event: Event) {
        let mut state = self.state.write().await;
        state.events.push(event);
        state.notify.notify_waiters();
    }

    async fn close(&self) {
        let mut state = self.state.write().await;
        state.completed = true;
        state.notify.notify_waiters();
    }

    /// Returns events after `cursor` (exclusive), capped at `batch_size`,
    /// plus the cursor to resume from and whether the stream has ended.
    pub async fn poll(&self, cursor: usize, batch_size: usize) -> (Vec<Event>, usize, bool) {
        let state = self.state.read().await;
        let available = state.events.len();
        let start = cursor.min(available);
        let end = (start + batch_size).min(available);
        let batch = state.events[start..end].to_vec();
        let next_cursor = end;
        let completed = state.completed && next_cursor >= available;
        (batch, next_cursor, completed)
    }

    /// Waits until new events are available past `cursor`, the observer is
    /// closed, or `timeout` elapses — the short/long-poll knob (§6 "long-poll
    /// or short-poll acceptable").
    pub async fn wait_for_events(&self, cursor: usize, timeout: std::time::Duration) {
        let notified = {
            let state = self.state.read().await;
            if state.events.len() > cursor || state.completed {
                return;
            }
            state.notify.clone()
        };
        let _ = tokio::time::timeout(timeout, notified.notified()).await;
    }
}

/// `sync.Map`-style `session_id -> Observer`, per §5's concurrency model: one
/// `RwLock<HashMap>` guarding the map itself, with each `Observer`'s queue
/// guarded independently so pushing an event never blocks an unrelated poll.
#[derive(Default)]
pub struct ObserverManager {
    observers: RwLock<HashMap<Uuid, Observer>>,
    by_session: RwLock<HashMap<Uuid, Uuid>>,
}

impl ObserverManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, session_id: Uuid) -> Observer {
        let observer = Observer::new(session_id);
        self.observers
            .write()
            .await
            .insert(observer.id(), observer.clone());
        self.by_session
            .write()
            .await
            .insert(session_id, observer.id());
        observer
    }

    pub async fn get(&self, observer_id: Uuid) -> Option<Observer> {
        self.observers.read().await.get(&observer_id).cloned()
    }

    pub async fn get_by_session(&self, session_id: Uuid) -> Option<Observer> {
        let observer_id = *self.by_session.read().await.get(&session_id)?;
        self.get(observer_id).await
    }

    pub async fn publish(&self, event: Event) {
        if let Some(observer) = self.get_by_session(event.session_id).await {
            observer.push(event).await;
        }
    }

    /// Drains and removes the session's observer (§4.10 "on session
    /// stop/complete, the Observer is drained and removed"). "Drained" here
    /// means the observer is marked completed so any in-flight poll returns
    /// its remaining events with `completed=true`, then the map entries are
    /// dropped once that poll reads them; we evict immediately from the
    /// lookup maps so no further events are routed to it.
    pub async fn close(&self, session_id: Uuid) {
        if let Some(observer) = self.get_by_session(session_id).await {
            observer.close().await;
        }
        if let Some(observer_id) = self.by_session.write().await.remove(&session_id) {
            self.observers.write().await.remove(&observer_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_contracts::EventType;

    fn sample_event(session_id: Uuid) -> Event {
        Event::new(
            EventType::ConversationStart,
            session_id,
            Uuid::now_v7(),
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn poll_returns_events_after_cursor_and_advances_it() {
        let manager = ObserverManager::new();
        let session_id = Uuid::now_v7();
        let observer = manager.create(session_id).await;

        manager.publish(sample_event(session_id)).await;
        manager.publish(sample_event(session_id)).await;

        let (batch, next_cursor, completed) = observer.poll(0, DEFAULT_POLL_BATCH_SIZE).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(next_cursor, 2);
        assert!(!completed);

        let (batch, next_cursor, _) = observer.poll(next_cursor, DEFAULT_POLL_BATCH_SIZE).await;
        assert!(batch.is_empty());
        assert_eq!(next_cursor, 2);
    }

    #[tokio::test]
    async fn close_marks_completed_and_removes_from_lookup() {
        let manager = ObserverManager::new();
        let session_id = Uuid::now_v7();
        let observer = manager.create(session_id).await;
        manager.publish(sample_event(session_id)).await;

        manager.close(session_id).await;

        let (batch, next_cursor, completed) = observer.poll(0, DEFAULT_POLL_BATCH_SIZE).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(next_cursor, 1);
        assert!(completed);
        assert!(manager.get_by_session(session_id).await.is_none());
    }
}
