// Tool-plane error taxonomy (§7), composed into `conduit_core::CoreError`
// at the turn-loop boundary so `ConversationAgent` sees one taxonomy.

use conduit_core::error::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolsError>;

#[derive(Debug, Error)]
pub enum ToolsError {
    #[error("provider discovery failed for {provider}: {reason}")]
    DiscoveryFailed { provider: String, reason: String },

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("tool registry construction conflict: '{0}' is registered more than once")]
    RegistryConflict(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ToolsError> for CoreError {
    fn from(err: ToolsError) -> Self {
        match err {
            ToolsError::DiscoveryFailed { provider, reason } => {
                CoreError::ProviderDiscoveryFailed(format!("{provider}: {reason}"))
            }
            ToolsError::ProviderUnavailable(p) => CoreError::ProviderUnavailable(p),
            ToolsError::ToolNotFound(name) => CoreError::ToolNotFound(name),
            ToolsError::ExecutionFailed(msg) => CoreError::ToolExecutionFailed(msg),
            ToolsError::RegistryConflict(name) => {
                CoreError::ValidationLogicFailure(format!("tool name collision: {name}"))
            }
            other => CoreError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}
