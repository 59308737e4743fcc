// Error taxonomy for the conversation loop (§7)
//
// Kinds, not type names: the taxonomy distinguishes behavior, not call
// sites. `kind()` gives the stable string used in emitted error events.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller-visible: invalid mode, missing Tasks/… folder, malformed schema.
    #[error("bad input: {0}")]
    BadInput(String),

    /// One provider could not be inventoried; non-fatal for the session.
    #[error("provider discovery failed: {0}")]
    ProviderDiscoveryFailed(String),

    /// A tool targeted at a provider currently marked error.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The LLM requested a tool name not in any registry class.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Tool ran but returned a failure or timed out.
    #[error("tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// Throttling/timeout/context-length signal; triggers fallback chain.
    #[error("llm transient error: {0}")]
    LlmTransient(String),

    /// All fallbacks exhausted.
    #[error("llm permanent error: {0}")]
    LlmPermanent(String),

    /// Internal invariant violated.
    #[error("validation logic failure: {0}")]
    ValidationLogicFailure(String),

    /// User-stop or timeout.
    #[error("cancelled")]
    Cancelled,

    /// Wraps a lower-level error that doesn't need its own taxonomy slot.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Stable kind string, used as the `kind` field on `llm_generation_error`
    /// and `tool_call_error` event payloads (§7).
    ///
    /// `ToolCallResponseLooksEmpty` from §7 is deliberately absent here: an
    /// empty-text/non-empty-tool-calls response is not an error at all (see
    /// `LlmResponse::has_tool_calls`), so it never reaches this enum.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::BadInput(_) => "bad_input",
            CoreError::ProviderDiscoveryFailed(_) => "provider_discovery_failed",
            CoreError::ProviderUnavailable(_) => "provider_unavailable",
            CoreError::ToolNotFound(_) => "tool_not_found",
            CoreError::ToolExecutionFailed(_) => "tool_execution_failed",
            CoreError::LlmTransient(_) => "llm_transient",
            CoreError::LlmPermanent(_) => "llm_permanent",
            CoreError::ValidationLogicFailure(_) => "validation_logic_failure",
            CoreError::Cancelled => "cancelled",
            CoreError::Internal(_) => "internal",
        }
    }

    /// `ToolNotFound`/`ToolExecutionFailed` feed back into the conversation
    /// instead of terminating the turn loop (§7 propagation policy).
    pub fn is_recoverable_in_loop(&self) -> bool {
        matches!(
            self,
            CoreError::ToolNotFound(_) | CoreError::ToolExecutionFailed(_)
        )
    }

    pub fn bad_input(msg: impl Into<String>) -> Self {
        CoreError::BadInput(msg.into())
    }

    pub fn tool_not_found(name: impl Into<String>) -> Self {
        CoreError::ToolNotFound(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_errors_are_loop_recoverable() {
        assert!(CoreError::tool_not_found("frobnicate").is_recoverable_in_loop());
        assert!(CoreError::ToolExecutionFailed("timeout".into()).is_recoverable_in_loop());
        assert!(!CoreError::bad_input("no mode").is_recoverable_in_loop());
        assert!(!CoreError::Cancelled.is_recoverable_in_loop());
    }

    #[test]
    fn kind_strings_match_taxonomy() {
        assert_eq!(CoreError::LlmTransient("x".into()).kind(), "llm_transient");
        assert_eq!(CoreError::Cancelled.kind(), "cancelled");
    }
}
