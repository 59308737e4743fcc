// EventBus (§4.10): fans every emitted event out to the session's Observer
// plus the PersistenceStore. Implements `conduit_core::traits::EventEmitter`
// so `ConversationAgent`/`PlannerOrchestrator`/`WorkflowOrchestrator` never
// know they're talking to HTTP-facing infrastructure.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_contracts::Event;
use conduit_core::error::Result;
use conduit_core::traits::EventEmitter;
use conduit_storage::DbEventEmitter;

use crate::observer::ObserverManager;

#[derive(Clone)]
pub struct EventBus {
    observers: Arc<ObserverManager>,
    store: DbEventEmitter,
}

impl EventBus {
    pub fn new(observers: Arc<ObserverManager>, store: DbEventEmitter) -> Self {
        Self { observers, store }
    }
}

#[async_trait]
impl EventEmitter for EventBus {
    async fn emit(&self, event: Event) -> Result<()> {
        self.observers.publish(event.clone()).await;
        self.store.emit(event).await
    }
}
