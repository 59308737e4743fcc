// CALL_LLM step (§4.1): emit start/end events, call the provider under the
// configured fallback chain, classify transient vs. permanent failure.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_contracts::ToolDefinition;

use super::Atom;
use crate::error::{CoreError, Result};
use crate::llm::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider, LlmResponse, ResponseFormat};
use crate::retry::FallbackChain;

pub struct CallModelInput {
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
}

pub struct CallModelOutput {
    pub response: LlmResponse,
    pub provider_name: String,
    pub model: String,
    pub attempts: u32,
}

/// Walks `chain` in configured order, retrying each entry per its
/// `RetryPolicy` before advancing — same-provider-first vs. cross-provider-
/// first is thus a property of how the caller built the chain, not of this
/// atom (§9 open question on fallback ordering).
#[derive(Clone)]
pub struct CallModelAtom {
    providers: Arc<Vec<Box<dyn LlmProvider>>>,
    chain: FallbackChain,
}

impl CallModelAtom {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>, chain: FallbackChain) -> Self {
        Self {
            providers: Arc::new(providers),
            chain,
        }
    }

    /// Builds a sibling atom sharing the same provider set under a
    /// different fallback chain — used when an orchestrator's planner,
    /// executor, and validator sub-agents each need their own model/
    /// temperature policy without re-registering providers per agent.
    pub fn with_chain(&self, chain: FallbackChain) -> Self {
        Self {
            providers: self.providers.clone(),
            chain,
        }
    }

    fn provider_for(&self, name: &str) -> Option<&dyn LlmProvider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    /// The first entry of the fallback chain, used for the one-shot
    /// `SmartRouter` call (§4.8) — routing doesn't need the full chain, just
    /// a cheap classifier call against whichever provider is primary.
    pub fn primary_provider(&self) -> Option<&dyn LlmProvider> {
        let entry = self.chain.entries.first()?;
        self.provider_for(&entry.provider)
    }

    /// One-shot JSON-mode completion over the same fallback chain, used by
    /// `ConversationAgent::invoke_structured` (§4.1 `InvokeStructured`) and
    /// by orchestrator sub-agents producing a `Plan`/`Verdict` (§4.5). No
    /// tools are offered; the caller's schema is embedded in `prompt`.
    pub async fn complete_structured(&self, prompt: &str) -> Result<String> {
        let message = LlmMessage {
            role: LlmMessageRole::System,
            content: prompt.to_string(),
            tool_calls: None,
            tool_call_id: None,
        };

        let mut last_err: Option<CoreError> = None;
        for entry in &self.chain.entries {
            let provider = self.provider_for(&entry.provider).ok_or_else(|| {
                CoreError::LlmPermanent(format!("no provider registered: {}", entry.provider))
            })?;
            let config = LlmCallConfig::new(entry.model.clone())
                .with_response_format(ResponseFormat::Json)
                .with_temperature(0.0);

            for attempt in 1..=self.chain.retry.max_attempts {
                if attempt > 1 {
                    tokio::time::sleep(self.chain.retry.delay_for_attempt(attempt)).await;
                }
                match provider.complete(std::slice::from_ref(&message), &config).await {
                    Ok(response) => return Ok(response.text),
                    Err(CoreError::LlmTransient(msg)) => {
                        last_err = Some(CoreError::LlmTransient(msg));
                        continue;
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CoreError::LlmPermanent("fallback chain exhausted with no entries".into())
        }))
    }
}

#[async_trait]
impl Atom for CallModelAtom {
    type Input = CallModelInput;
    type Output = CallModelOutput;

    fn name(&self) -> &'static str {
        "call_model"
    }

    async fn execute(&self, input: Self::Input) -> Result<Self::Output> {
        let mut last_err: Option<CoreError> = None;
        let mut total_attempts = 0u32;

        for entry in &self.chain.entries {
            let provider = self.provider_for(&entry.provider).ok_or_else(|| {
                CoreError::LlmPermanent(format!("no provider registered: {}", entry.provider))
            })?;

            let config = LlmCallConfig::new(entry.model.clone())
                .with_tools(input.tools.clone())
                .with_temperature(input.temperature.unwrap_or(1.0));

            for attempt in 1..=self.chain.retry.max_attempts {
                total_attempts += 1;
                if attempt > 1 {
                    tokio::time::sleep(self.chain.retry.delay_for_attempt(attempt)).await;
                }

                match provider.complete(&input.messages, &config).await {
                    Ok(response) => {
                        return Ok(CallModelOutput {
                            response,
                            provider_name: entry.provider.clone(),
                            model: entry.model.clone(),
                            attempts: total_attempts,
                        });
                    }
                    Err(CoreError::LlmTransient(msg)) => {
                        last_err = Some(CoreError::LlmTransient(msg));
                        continue;
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CoreError::LlmPermanent("fallback chain exhausted with no entries".into())
        }))
    }
}
