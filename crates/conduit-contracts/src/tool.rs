// Tool DTOs (§3 "Tool", §4.2 "Tool Registry", §4.4 "Virtual Tools")

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Where a tool's implementation lives. Precedence on name collision is
/// `Custom` > `Virtual` > `External` (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    /// Discovered from an MCP-style external provider at runtime.
    External,
    /// Built into the core: prompts, resources, workspace files, large-output handles.
    Virtual,
    /// Operator-declared, pinned ahead of discovery.
    Custom,
}

impl ToolClass {
    /// Higher wins a name collision.
    pub fn precedence(self) -> u8 {
        match self {
            ToolClass::Custom => 2,
            ToolClass::Virtual => 1,
            ToolClass::External => 0,
        }
    }
}

/// A tool's advertised shape, handed to the LLM provider as part of the
/// call config (§4.1 `tool_count`, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing accepted arguments.
    pub parameters: serde_json::Value,
    pub class: ToolClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

/// A single tool invocation requested by the model mid-turn (§4.1 DISPATCH_TOOLS).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Outcome of executing a `ToolCall`. `content` is what gets folded back
/// into the conversation as a tool message; `is_error` marks it as a
/// tool-reported failure rather than a successful (if unusual) result.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
    /// Set when `content` has been swapped for a handle by the large-output
    /// substitution path (§4.4).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
            handle: None,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: message.into(),
            is_error: true,
            handle: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_beats_virtual_beats_external() {
        assert!(ToolClass::Custom.precedence() > ToolClass::Virtual.precedence());
        assert!(ToolClass::Virtual.precedence() > ToolClass::External.precedence());
    }

    #[test]
    fn tool_result_error_sets_flag() {
        let r = ToolResult::error("call-1", "boom");
        assert!(r.is_error);
        assert_eq!(r.content, "boom");
    }
}
