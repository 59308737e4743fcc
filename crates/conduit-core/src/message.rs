// Conversation messages assembled by BUILD_MESSAGES (§4.1)

use chrono::{DateTime, Utc};
use conduit_contracts::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation. `ConversationAgent` mutates only its
/// own `messages` slice (§4.1 "side effects"); nothing here is persisted
/// directly — `MessageStore` is the seam for that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content.into(), None, None)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into(), None, None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), None, None)
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), None, Some(tool_calls))
    }

    pub fn tool_result(result: &ToolResult) -> Self {
        Self::new(
            MessageRole::Tool,
            result.content.clone(),
            Some(result.tool_call_id.clone()),
            None,
        )
    }

    fn new(
        role: MessageRole,
        content: String,
        tool_call_id: Option<String>,
        tool_calls: Option<Vec<ToolCall>>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content,
            tool_call_id,
            tool_calls,
            created_at: Utc::now(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_with_tool_calls_reports_has_tool_calls() {
        let call = ToolCall {
            id: "call-1".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"path": "a.txt"}),
        };
        let msg = ConversationMessage::assistant_with_tool_calls("", vec![call]);
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn plain_assistant_message_has_no_tool_calls() {
        let msg = ConversationMessage::assistant("hi");
        assert!(!msg.has_tool_calls());
    }
}
