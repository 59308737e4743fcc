// OpenAI chat-completions wire format.
//
// conduit_core::llm::LlmProvider is a non-streaming `complete()` call, so
// the SSE chunks are aggregated here into one LlmResponse rather than
// surfaced as a stream — callers that want incremental delivery get it
// from the event pipeline (llm_generation_start/end), not from this trait.

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

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CoreError::bad_input("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    /// Used against OpenAI-compatible providers (e.g. a local gateway) and
    /// in tests against a wiremock server.
    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }

    fn convert_role(role: LlmMessageRole) -> &'static str {
        match role {
            LlmMessageRole::System => "system",
            LlmMessageRole::User => "user",
            LlmMessageRole::Assistant => "assistant",
            LlmMessageRole::Tool => "tool",
        }
    }

    fn convert_message(msg: &LlmMessage) -> WireMessage {
        WireMessage {
            role: Self::convert_role(msg.role).to_string(),
            content: if msg.content.is_empty() {
                None
            } else {
                Some(msg.content.clone())
            },
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| WireToolCall {
                        id: tc.id.clone(),
                        r#type: "function".to_string(),
                        function: WireFunctionCall {
                            name: tc.name.clone(),
                            arguments: serde_json::to_string(&tc.arguments).unwrap_or_default(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
        tools
            .iter()
            .map(|tool| WireTool {
                r#type: "function".to_string(),
                function: WireFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[LlmMessage], config: &LlmCallConfig) -> Result<LlmResponse> {
        let wire_messages: Vec<WireMessage> = messages.iter().map(Self::convert_message).collect();
        let tools = (!config.tools.is_empty()).then(|| Self::convert_tools(&config.tools));
        let response_format = matches!(config.response_format, ResponseFormat::Json)
            .then(|| json!({"type": "json_object"}));

        let request = WireRequest {
            model: config.model.clone(),
            messages: wire_messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: true,
            tools,
            response_format,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut finish_reason = None;
        let mut completion_tokens = 0u32;

        let mut stream = response.bytes_stream().eventsource();
        while let Some(event) = stream.next().await {
            let event = event.map_err(|e| CoreError::LlmTransient(format!("stream error: {e}")))?;
            if event.data == "[DONE]" {
                break;
            }
            let chunk: WireStreamChunk = match serde_json::from_str(&event.data) {
                Ok(chunk) => chunk,
                Err(_) => continue,
            };
            let Some(choice) = chunk.choices.into_iter().next() else {
                continue;
            };
            if let Some(delta_tool_calls) = choice.delta.tool_calls {
                for tc in delta_tool_calls {
                    let idx = tc.index as usize;
                    while tool_calls.len() <= idx {
                        tool_calls.push(ToolCall {
                            id: String::new(),
                            name: String::new(),
                            arguments: json!(""),
                        });
                    }
                    if let Some(id) = tc.id {
                        tool_calls[idx].id = id;
                    }
                    if let Some(function) = tc.function {
                        if let Some(name) = function.name {
                            tool_calls[idx].name = name;
                        }
                        if let Some(args) = function.arguments {
                            let current = tool_calls[idx].arguments.as_str().unwrap_or("");
                            tool_calls[idx].arguments = json!(format!("{current}{args}"));
                        }
                    }
                }
            }
            if let Some(content) = choice.delta.content {
                text.push_str(&content);
                completion_tokens += 1;
            }
            if let Some(reason) = choice.finish_reason {
                finish_reason = Some(reason);
            }
        }

        let tool_calls = tool_calls
            .into_iter()
            .map(|mut tc| {
                if let Some(raw) = tc.arguments.as_str() {
                    tc.arguments = serde_json::from_str(raw).unwrap_or(json!({}));
                }
                tc
            })
            .collect();

        Ok(LlmResponse {
            text,
            tool_calls,
            usage: LlmUsage {
                prompt_tokens: None,
                completion_tokens: Some(completion_tokens),
                total_tokens: Some(completion_tokens),
            },
            finish_reason,
        })
    }
}

fn classify_status(status: StatusCode, body: String) -> CoreError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        CoreError::LlmTransient(format!("openai error ({status}): {body}"))
    } else {
        CoreError::LlmPermanent(format!("openai error ({status}): {body}"))
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTool {
    r#type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    r#type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireStreamToolCall {
    index: u32,
    id: Option<String>,
    function: Option<WireStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct WireStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::llm::LlmMessageRole;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn aggregates_sse_text_deltas_into_one_response() {
        let server = MockServer::start().await;
        let sse_body = "data: {\"choices\":[{\"delta\":{\"content\":\"4\"},\"finish_reason\":null}]}\n\n\
                         data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
                         data: [DONE]\n\n";

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url("test-key", server.uri());
        let messages = vec![LlmMessage {
            role: LlmMessageRole::User,
            content: "2+2?".into(),
            tool_calls: None,
            tool_call_id: None,
        }];
        let config = LlmCallConfig::new("gpt-4o");

        let response = provider.complete(&messages, &config).await.unwrap();
        assert_eq!(response.text, "4");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn server_errors_classify_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url("test-key", server.uri());
        let messages = vec![LlmMessage {
            role: LlmMessageRole::User,
            content: "hi".into(),
            tool_calls: None,
            tool_call_id: None,
        }];
        let config = LlmCallConfig::new("gpt-4o");

        let err = provider.complete(&messages, &config).await.unwrap_err();
        assert!(matches!(err, CoreError::LlmTransient(_)));
    }
}
