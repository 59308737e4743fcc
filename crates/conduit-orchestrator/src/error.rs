// Orchestrator error taxonomy, composed into `conduit_core::CoreError` at
// the Dispatcher boundary just like `conduit_tools::ToolsError`.

use conduit_core::error::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("planner produced an invalid plan: {0}")]
    InvalidPlan(String),

    #[error("validator produced an unparseable verdict: {0}")]
    InvalidVerdict(String),

    #[error("iteration cap reached after {0} iterations")]
    IterationCapReached(u32),

    #[error("workflow requires a selected folder under Tasks/")]
    MissingTasksFolder,

    #[error("workflow is in state '{actual}', which does not accept this action")]
    InvalidWorkflowState { actual: String },

    #[error("orchestrator cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Tools(#[from] conduit_tools::ToolsError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<OrchestratorError> for CoreError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Cancelled => CoreError::Cancelled,
            OrchestratorError::Core(inner) => inner,
            OrchestratorError::InvalidPlan(_)
            | OrchestratorError::InvalidVerdict(_)
            | OrchestratorError::MissingTasksFolder
            | OrchestratorError::InvalidWorkflowState { .. } => {
                CoreError::ValidationLogicFailure(err.to_string())
            }
            OrchestratorError::IterationCapReached(_) => {
                CoreError::Internal(anyhow::anyhow!(err.to_string()))
            }
            OrchestratorError::Tools(inner) => inner.into(),
            OrchestratorError::Other(inner) => CoreError::Internal(inner),
        }
    }
}
