// Provider-agnostic LLM call surface (§6 "concrete LLM provider SDKs
// treated as a provider interface"). conduit-openai and conduit-anthropic
// each implement `LlmProvider` against this shape.

use async_trait::async_trait;
use conduit_contracts::{ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{ConversationMessage, MessageRole};

/// Message format accepted by a provider call.
#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmMessageRole,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl From<&ConversationMessage> for LlmMessage {
    fn from(msg: &ConversationMessage) -> Self {
        let role = match msg.role {
            MessageRole::System => LlmMessageRole::System,
            MessageRole::User => LlmMessageRole::User,
            MessageRole::Assistant => LlmMessageRole::Assistant,
            MessageRole::Tool => LlmMessageRole::Tool,
        };
        LlmMessage {
            role,
            content: msg.content.clone(),
            tool_calls: msg.tool_calls.clone(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

/// How strongly the provider should be pushed toward calling a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Required,
    None,
}

/// Response format requested of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    /// JSON-mode; used by `StructuredOutput` (§4.9) and `SmartRouter` (§4.8).
    Json,
}

#[derive(Debug, Clone)]
pub struct LlmCallConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub response_format: ResponseFormat,
}

impl LlmCallConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            response_format: ResponseFormat::Text,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: LlmUsage,
    pub finish_reason: Option<String>,
}

impl LlmResponse {
    /// §7 `ToolCallResponseLooksEmpty`: empty text plus non-empty tool calls
    /// is success-with-tool-calls, never an error condition.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Implemented once per backend (conduit-openai, conduit-anthropic). Kept
/// deliberately small: streaming, retries and fallback live in
/// `ConversationAgent`/`RetryPolicy`, not here.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable identifier used in fallback-chain config and event payloads
    /// (e.g. `"openai"`, `"anthropic"`).
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[LlmMessage], config: &LlmCallConfig) -> Result<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_with_tool_calls_is_not_treated_as_empty_response() {
        let response = LlmResponse {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: "call-1".into(),
                name: "search".into(),
                arguments: serde_json::json!({}),
            }],
            usage: LlmUsage::default(),
            finish_reason: Some("tool_calls".into()),
        };
        assert!(response.has_tool_calls());
    }
}
