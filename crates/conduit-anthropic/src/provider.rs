// Anthropic Messages API wire format.
//
// Anthropic splits the system prompt into its own top-level field and
// represents tool calls as `tool_use` content blocks rather than OpenAI's
// `tool_calls` array, so the wire shape differs from conduit-openai even
// though both implement the same `conduit_core::llm::LlmProvider` trait.
// Streamed content-block deltas are aggregated into one `LlmResponse`,
// mirroring conduit-openai's SSE aggregation.

use async_trait::async_trait;
use conduit_contracts::{ToolCall, ToolDefinition};
use conduit_core::error::{CoreError, Result};
use conduit_core::llm::{
    LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider, LlmResponse, LlmUsage, ResponseFormat,
};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    api_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| CoreError::bad_input("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }

    /// Anthropic keeps the system prompt out of the `messages` array; this
    /// splits it out and converts the rest to Anthropic's block-content shape.
    fn split_system_and_messages(messages: &[LlmMessage]) -> (Option<String>, Vec<WireMessage>) {
        let mut system = None;
        let mut out = Vec::with_capacity(messages.len());
        for msg in messages {
            match msg.role {
                LlmMessageRole::System => {
                    system = Some(match system {
                        Some(existing) => format!("{existing}\n\n{}", msg.content),
                        None => msg.content.clone(),
                    });
                }
                LlmMessageRole::Tool => {
                    out.push(WireMessage {
                        role: "user".to_string(),
                        content: vec![WireContentBlock::ToolResult {
                            tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                            content: msg.content.clone(),
                        }],
                    });
                }
                LlmMessageRole::User | LlmMessageRole::Assistant => {
                    let role = if msg.role == LlmMessageRole::User {
                        "user"
                    } else {
                        "assistant"
                    };
                    let mut content = Vec::new();
                    if !msg.content.is_empty() {
                        content.push(WireContentBlock::Text {
                            text: msg.content.clone(),
                        });
                    }
                    if let Some(tool_calls) = &msg.tool_calls {
                        for tc in tool_calls {
                            content.push(WireContentBlock::ToolUse {
                                id: tc.id.clone(),
                                name: tc.name.clone(),
                                input: tc.arguments.clone(),
                            });
                        }
                    }
                    out.push(WireMessage {
                        role: role.to_string(),
                        content,
                    });
                }
            }
        }
        (system, out)
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
        tools
            .iter()
            .map(|tool| WireTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.parameters.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, messages: &[LlmMessage], config: &LlmCallConfig) -> Result<LlmResponse> {
        let (system, wire_messages) = Self::split_system_and_messages(messages);
        let tools = (!config.tools.is_empty()).then(|| Self::convert_tools(&config.tools));

        // Anthropic has no dedicated JSON response-format flag; StructuredOutput
        // and SmartRouter (§4.8, §4.9) achieve JSON-mode by instructing it in
        // the system prompt, which the caller already does before this trait
        // sees the message.
        let _ = matches!(config.response_format, ResponseFormat::Json);

        let request = WireRequest {
            model: config.model.clone(),
            system,
            messages: wire_messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens.unwrap_or(4096),
            stream: true,
            tools,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::LlmTransient(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let mut text = String::new();
        let mut tool_calls: Vec<PendingToolUse> = Vec::new();
        let mut stop_reason = None;
        let mut usage = LlmUsage::default();

        let mut stream = response.bytes_stream().eventsource();
        while let Some(event) = stream.next().await {
            let event = event.map_err(|e| CoreError::LlmTransient(format!("stream error: {e}")))?;
            let Ok(parsed) = serde_json::from_str::<WireStreamEvent>(&event.data) else {
                continue;
            };
            match parsed {
                WireStreamEvent::ContentBlockStart { content_block, .. } => {
                    if let WireContentBlockStart::ToolUse { id, name } = content_block {
                        tool_calls.push(PendingToolUse {
                            id,
                            name,
                            partial_json: String::new(),
                        });
                    }
                }
                WireStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                    WireDelta::TextDelta { text: chunk } => text.push_str(&chunk),
                    WireDelta::InputJsonDelta { partial_json } => {
                        if let Some(last) = tool_calls.last_mut() {
                            last.partial_json.push_str(&partial_json);
                        }
                    }
                },
                WireStreamEvent::MessageDelta { delta, usage: u } => {
                    if let Some(reason) = delta.stop_reason {
                        stop_reason = Some(reason);
                    }
                    if let Some(u) = u {
                        usage.completion_tokens = Some(u.output_tokens);
                    }
                }
                WireStreamEvent::MessageStart { message } => {
                    usage.prompt_tokens = Some(message.usage.input_tokens);
                }
                WireStreamEvent::Other => {}
            }
        }

        let tool_calls = tool_calls
            .into_iter()
            .map(|pending| ToolCall {
                id: pending.id,
                name: pending.name,
                arguments: if pending.partial_json.is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&pending.partial_json).unwrap_or(json!({}))
                },
            })
            .collect();

        usage.total_tokens = match (usage.prompt_tokens, usage.completion_tokens) {
            (Some(p), Some(c)) => Some(p + c),
            _ => None,
        };

        Ok(LlmResponse {
            text,
            tool_calls,
            usage,
            finish_reason: stop_reason,
        })
    }
}

fn classify_status(status: StatusCode, body: String) -> CoreError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        CoreError::LlmTransient(format!("anthropic error ({status}): {body}"))
    } else {
        CoreError::LlmPermanent(format!("anthropic error ({status}): {body}"))
    }
}

struct PendingToolUse {
    id: String,
    name: String,
    partial_json: String,
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: Vec<WireContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireStreamEvent {
    MessageStart { message: WireMessageStart },
    ContentBlockStart { index: u32, content_block: WireContentBlockStart },
    ContentBlockDelta { index: u32, delta: WireDelta },
    ContentBlockStop,
    MessageDelta { delta: WireMessageDelta, #[serde(default)] usage: Option<WireUsage> },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireMessageStart {
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContentBlockStart {
    Text { #[serde(default)] text: String },
    ToolUse { id: String, name: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Deserialize)]
struct WireMessageDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::llm::LlmMessageRole;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn aggregates_text_deltas_into_one_response() {
        let server = MockServer::start().await;
        let sse_body = "event: message_start\n\
                         data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":10,\"output_tokens\":0}}}\n\n\
                         event: content_block_start\n\
                         data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
                         event: content_block_delta\n\
                         data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"4\"}}\n\n\
                         event: message_delta\n\
                         data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":1}}\n\n\
                         event: message_stop\n\
                         data: {\"type\":\"message_stop\"}\n\n";

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_base_url("test-key", server.uri());
        let messages = vec![LlmMessage {
            role: LlmMessageRole::User,
            content: "2+2?".into(),
            tool_calls: None,
            tool_call_id: None,
        }];
        let config = LlmCallConfig::new("claude-3-5-sonnet");

        let response = provider.complete(&messages, &config).await.unwrap();
        assert_eq!(response.text, "4");
        assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(response.usage.prompt_tokens, Some(10));
    }

    #[tokio::test]
    async fn server_errors_classify_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(529))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_base_url("test-key", server.uri());
        let messages = vec![LlmMessage {
            role: LlmMessageRole::User,
            content: "hi".into(),
            tool_calls: None,
            tool_call_id: None,
        }];
        let config = LlmCallConfig::new("claude-3-5-sonnet");

        let err = provider.complete(&messages, &config).await.unwrap_err();
        assert!(matches!(err, CoreError::LlmTransient(_)));
    }

    #[test]
    fn splits_system_message_out_of_the_conversation_array() {
        let messages = vec![
            LlmMessage {
                role: LlmMessageRole::System,
                content: "be terse".into(),
                tool_calls: None,
                tool_call_id: None,
            },
            LlmMessage {
                role: LlmMessageRole::User,
                content: "hi".into(),
                tool_calls: None,
                tool_call_id: None,
            },
        ];
        let (system, wire) = AnthropicProvider::split_system_and_messages(&messages);
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(wire.len(), 1);
    }
}
