// StructuredOutput (§4.9)
//
// A second LLM call, JSON-mode, with a caller-supplied JSON-schema string
// embedded verbatim in the prompt. No reflection-based schema generation
// (§9: a prior approach caused infinite recursion on cyclic types) — the
// caller owns the schema entirely.

use conduit_contracts::{EventType, StructuredOutputErrorData};
use serde::de::DeserializeOwned;

use crate::error::{CoreError, Result};
use crate::llm::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider, ResponseFormat};

pub struct StructuredOutputRequest<'a> {
    pub question: &'a str,
    pub schema_json: &'a str,
    pub model: String,
}

/// Runs one JSON-mode completion and parses the result into `T`.
///
/// Callers are expected to wrap this with their own event emission
/// (structured_output_start/end/error) the same way `ConversationAgent`
/// wraps `CallModelAtom` — kept separate here so this stays usable outside
/// a full conversation (e.g. a one-shot classification call).
pub async fn generate<T: DeserializeOwned>(
    provider: &dyn LlmProvider,
    request: StructuredOutputRequest<'_>,
) -> Result<T> {
    let prompt = format!(
        "Respond with JSON only, matching exactly this JSON Schema:\n{}\n\nQuestion: {}",
        request.schema_json, request.question
    );

    let messages = vec![LlmMessage {
        role: LlmMessageRole::System,
        content: prompt,
        tool_calls: None,
        tool_call_id: None,
    }];

    let config = LlmCallConfig::new(request.model)
        .with_response_format(ResponseFormat::Json)
        .with_temperature(0.0);

    let response = provider.complete(&messages, &config).await?;

    serde_json::from_str(&response.text).map_err(|err| {
        CoreError::BadInput(format!(
            "structured output did not validate against caller schema: {err}"
        ))
    })
}

pub fn error_event_data(err: &CoreError) -> (EventType, StructuredOutputErrorData) {
    (
        EventType::StructuredOutputError,
        StructuredOutputErrorData {
            error: err.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::llm::LlmResponse;

    struct StubProvider {
        text: String,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _messages: &[LlmMessage],
            _config: &LlmCallConfig,
        ) -> Result<LlmResponse> {
            Ok(LlmResponse {
                text: self.text.clone(),
                tool_calls: Vec::new(),
                usage: Default::default(),
                finish_reason: None,
            })
        }
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Answer {
        value: i32,
    }

    #[tokio::test]
    async fn parses_valid_json_into_caller_type() {
        let provider = StubProvider {
            text: r#"{"value": 4}"#.to_string(),
        };
        let answer: Answer = generate(
            &provider,
            StructuredOutputRequest {
                question: "2+2?",
                schema_json: r#"{"type":"object","properties":{"value":{"type":"integer"}}}"#,
                model: "gpt-4o".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(answer, Answer { value: 4 });
    }

    #[tokio::test]
    async fn surfaces_parse_error_without_masking() {
        let provider = StubProvider {
            text: "not json".to_string(),
        };
        let result: Result<Answer> = generate(
            &provider,
            StructuredOutputRequest {
                question: "2+2?",
                schema_json: "{}",
                model: "gpt-4o".into(),
            },
        )
        .await;
        assert!(matches!(result, Err(CoreError::BadInput(_))));
    }
}
