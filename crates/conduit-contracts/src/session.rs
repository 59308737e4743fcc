// Session DTOs (§3 "Session")

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Execution mode chosen for a session. Drives which component owns the
/// conversation: `Simple`/`React`/`Workflow` go through `ConversationAgent`,
/// `Orchestrator` spawns the planner/executor/validator trio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Simple,
    React,
    Orchestrator,
    Workflow,
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentMode::Simple => write!(f, "simple"),
            AgentMode::React => write!(f, "react"),
            AgentMode::Orchestrator => write!(f, "orchestrator"),
            AgentMode::Workflow => write!(f, "workflow"),
        }
    }
}

impl std::str::FromStr for AgentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(AgentMode::Simple),
            "react" => Ok(AgentMode::React),
            "orchestrator" => Ok(AgentMode::Orchestrator),
            "workflow" => Ok(AgentMode::Workflow),
            other => Err(format!("unknown agent_mode: {other}")),
        }
    }
}

impl AgentMode {
    /// Orchestrator and workflow modes require a `Tasks/…` folder attached (§4.7).
    pub fn requires_tasks_folder(self) -> bool {
        matches!(self, AgentMode::Orchestrator | AgentMode::Workflow)
    }
}

/// Terminal/non-terminal status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Error,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            "error" => Ok(SessionStatus::Error),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// A single conversational session driven by the core to completion.
///
/// Exactly one Session is active per HTTP request; many may coexist
/// concurrently across requests (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_query_id: Option<Uuid>,
    pub title: String,
    pub agent_mode: AgentMode,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A file or folder attached to a query (`file_context` in §6).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileContextEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileContextKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileContextKind {
    File,
    Folder,
}

/// `POST /api/query` request body (§6).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryRequest {
    pub query: String,
    pub agent_mode: AgentMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_query_id: Option<Uuid>,
    #[serde(default)]
    pub file_context: Vec<FileContextEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// `POST /api/query` response body: returns promptly, execution continues
/// in the background (§6).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryResponse {
    pub session_id: Uuid,
    pub observer_id: Uuid,
}

/// The magic continuation marker a workflow-mode "Approve" button sends
/// through `POST /api/query` (§4.7, §6). Parsed out of the raw query text.
pub const WORKFLOW_CONTINUE_MARKER: &str = "__WORKFLOW_CONTINUE__";

/// Parse a query body for the workflow continuation marker, returning the
/// embedded request id if present.
pub fn parse_workflow_continuation(query: &str) -> Option<&str> {
    let rest = query.trim().strip_prefix(WORKFLOW_CONTINUE_MARKER)?;
    Some(rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_mode_round_trips_through_display_and_from_str() {
        for mode in [
            AgentMode::Simple,
            AgentMode::React,
            AgentMode::Orchestrator,
            AgentMode::Workflow,
        ] {
            let s = mode.to_string();
            assert_eq!(s.parse::<AgentMode>().unwrap(), mode);
        }
    }

    #[test]
    fn only_orchestrator_and_workflow_require_tasks_folder() {
        assert!(!AgentMode::Simple.requires_tasks_folder());
        assert!(!AgentMode::React.requires_tasks_folder());
        assert!(AgentMode::Orchestrator.requires_tasks_folder());
        assert!(AgentMode::Workflow.requires_tasks_folder());
    }

    #[test]
    fn parses_workflow_continue_marker() {
        let id = parse_workflow_continuation("__WORKFLOW_CONTINUE__ req-123").unwrap();
        assert_eq!(id, "req-123");
        assert!(parse_workflow_continuation("hello world").is_none());
    }
}
