// Workflow DTOs (§3 "Workflow", §4.7 "Workflow Orchestrator")

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// State machine driving a workflow-mode session through its todo-list
/// lifecycle (§4.7). Transitions: PreVerification -> PostVerification (on
/// todo-list approval) -> PostVerificationTodoRefinement (on human feedback
/// requesting changes) -> back to PostVerification (on re-approval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    PreVerification,
    PostVerification,
    PostVerificationTodoRefinement,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::PreVerification => write!(f, "pre_verification"),
            WorkflowStatus::PostVerification => write!(f, "post_verification"),
            WorkflowStatus::PostVerificationTodoRefinement => {
                write!(f, "post_verification_todo_refinement")
            }
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_verification" => Ok(WorkflowStatus::PreVerification),
            "post_verification" => Ok(WorkflowStatus::PostVerification),
            "post_verification_todo_refinement" => {
                Ok(WorkflowStatus::PostVerificationTodoRefinement)
            }
            other => Err(format!("unknown workflow status: {other}")),
        }
    }
}

/// Row backing a workflow-mode session's approval gate (§4.7, §4.11 schema).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Workflow {
    pub workflow_id: Uuid,
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_query_id: Option<Uuid>,
    /// User-editable objective driving the todo-planner (§3 "Workflow").
    pub objective: String,
    pub status: WorkflowStatus,
    pub todo_file_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_status_round_trips() {
        for s in [
            WorkflowStatus::PreVerification,
            WorkflowStatus::PostVerification,
            WorkflowStatus::PostVerificationTodoRefinement,
        ] {
            assert_eq!(s.to_string().parse::<WorkflowStatus>().unwrap(), s);
        }
    }
}
