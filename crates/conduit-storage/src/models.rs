// Row types mirroring `conduit_storage`'s schema (§4.11). Each has a mapping
// function to/from its `conduit_contracts` wire DTO — rows never cross the
// crate boundary directly.

use chrono::{DateTime, Utc};
use conduit_contracts::{AgentMode, PresetQuery, Session, SessionStatus, Workflow, WorkflowStatus};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: i64,
    pub session_id: Uuid,
    pub title: String,
    pub agent_mode: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub preset_query_id: Option<Uuid>,
}

impl SessionRow {
    pub fn into_domain(self) -> Session {
        Session {
            session_id: self.session_id,
            preset_query_id: self.preset_query_id,
            title: self.title,
            agent_mode: self.agent_mode.parse().unwrap_or(AgentMode::Simple),
            status: self.status.parse().unwrap_or(SessionStatus::Error),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

pub struct CreateSessionRow {
    pub session_id: Uuid,
    pub title: String,
    pub agent_mode: String,
    /// Empty string is stored as NULL (§3 "empty string stored as NULL").
    pub preset_query_id: Option<Uuid>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub session_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub event_data: serde_json::Value,
}

pub struct CreateEventRow {
    pub session_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PresetQueryRow {
    pub id: i64,
    pub preset_query_id: Uuid,
    pub label: String,
    pub query: String,
    pub agent_mode: String,
    pub selected_servers: serde_json::Value,
    pub is_predefined: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PresetQueryRow {
    pub fn into_domain(self) -> PresetQuery {
        let selected_servers = serde_json::from_value(self.selected_servers).unwrap_or_default();
        PresetQuery {
            preset_query_id: self.preset_query_id,
            name: self.label,
            query: self.query,
            agent_mode: self.agent_mode.parse().unwrap_or(AgentMode::Simple),
            selected_servers,
            is_predefined: self.is_predefined,
            created_at: self.created_at,
        }
    }
}

pub struct CreatePresetQueryRow {
    pub preset_query_id: Uuid,
    pub label: String,
    pub query: String,
    pub agent_mode: String,
    pub selected_servers: serde_json::Value,
    pub is_predefined: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkflowRow {
    pub id: i64,
    pub workflow_id: Uuid,
    pub session_id: Uuid,
    pub preset_query_id: Option<Uuid>,
    pub objective: String,
    pub workflow_status: String,
    pub todo_file_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    pub fn into_domain(self) -> Workflow {
        Workflow {
            workflow_id: self.workflow_id,
            session_id: self.session_id,
            preset_query_id: self.preset_query_id,
            objective: self.objective,
            status: self
                .workflow_status
                .parse()
                .unwrap_or(WorkflowStatus::PreVerification),
            todo_file_path: self.todo_file_path,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub struct CreateWorkflowRow {
    pub workflow_id: Uuid,
    pub session_id: Uuid,
    pub preset_query_id: Option<Uuid>,
    pub objective: String,
    pub todo_file_path: String,
}
