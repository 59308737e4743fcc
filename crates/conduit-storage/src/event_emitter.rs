// Database-backed EventEmitter (§4.10, §4.11): implements
// `conduit_core::traits::EventEmitter` against the `events` table, folding
// the full envelope into one JSONB column per row.

use async_trait::async_trait;
use conduit_contracts::Event;
use conduit_core::error::{CoreError, Result};
use conduit_core::traits::EventEmitter;

use crate::models::CreateEventRow;
use crate::repositories::Database;

#[derive(Clone)]
pub struct DbEventEmitter {
    db: Database,
}

impl DbEventEmitter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventEmitter for DbEventEmitter {
    async fn emit(&self, event: Event) -> Result<()> {
        let event_type = serde_json::to_value(event.event_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        self.db
            .create_event(CreateEventRow {
                session_id: event.session_id,
                event_type,
                event_data: serde_json::json!({
                    "trace_id": event.trace_id,
                    "span_id": event.span_id,
                    "parent_id": event.parent_id,
                    "hierarchy_level": event.hierarchy_level,
                    "component": event.component,
                    "parent_type": event.parent_type,
                    "data": event.data,
                    "metadata": event.metadata,
                }),
            })
            .await
            .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?;

        Ok(())
    }
}

pub fn create_db_event_emitter(db: Database) -> DbEventEmitter {
    DbEventEmitter::new(db)
}
