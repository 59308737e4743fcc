// SmartRouter (§4.8)
//
// Runs exactly once per conversation, before the first CALL_LLM, when both
// thresholds are exceeded. Filters the provider set down with a single
// low-temperature LLM call; the result is frozen for the rest of the
// conversation — ConversationAgent never re-invokes this per turn.

use serde::{Deserialize, Serialize};

use crate::config::SmartRoutingThresholds;
use crate::llm::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider, ResponseFormat};
use crate::message::ConversationMessage;

/// One provider's summary as shown to the routing LLM: a handful of tool
/// names plus short descriptions, not the full tool list (§4.8 "first few
/// tool names plus descriptions ~100 chars each").
#[derive(Debug, Clone)]
pub struct ProviderSummary {
    pub name: String,
    pub tool_count: usize,
    pub sample_tools: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartRoutingDecision {
    pub relevant_servers: Vec<String>,
    pub reasoning: String,
}

pub struct SmartRoutingOutcome {
    pub decision: SmartRoutingDecision,
    pub succeeded: bool,
    pub duration_ms: u64,
}

/// Should routing run at all, per the dual-threshold gate.
pub fn should_route(
    total_tools: usize,
    total_servers: usize,
    thresholds: &SmartRoutingThresholds,
) -> bool {
    total_tools > thresholds.max_tools && total_servers > thresholds.max_servers
}

pub async fn route(
    provider: &dyn LlmProvider,
    history: &[ConversationMessage],
    providers: &[ProviderSummary],
) -> SmartRoutingOutcome {
    let start = std::time::Instant::now();

    let catalogue = providers
        .iter()
        .map(|p| {
            let samples = p
                .sample_tools
                .iter()
                .map(|(name, desc)| format!("  - {name}: {}", truncate(desc, 100)))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{} ({} tools)\n{}", p.name, p.tool_count, samples)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let prompt = format!(
        "Given the full conversation and this provider catalogue, choose which \
         providers are relevant. Respond as JSON: {{\"relevant_servers\": [string], \"reasoning\": string}}.\n\n\
         Providers:\n{catalogue}"
    );

    let mut messages = vec![LlmMessage {
        role: LlmMessageRole::System,
        content: prompt,
        tool_calls: None,
        tool_call_id: None,
    }];
    messages.extend(history.iter().map(LlmMessage::from));

    let config = LlmCallConfig::new("smart-router")
        .with_response_format(ResponseFormat::Json)
        .with_temperature(0.1)
        .with_max_tokens(300);

    let outcome = provider.complete(&messages, &config).await;

    match outcome {
        Ok(response) => match parse_decision(&response.text) {
            Some(decision) => SmartRoutingOutcome {
                decision,
                succeeded: true,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            None => {
                tracing::warn!("smart router response did not parse; falling back to all providers");
                fallback(providers, start.elapsed().as_millis() as u64)
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "smart router call failed; falling back to all providers");
            fallback(providers, start.elapsed().as_millis() as u64)
        }
    }
}

fn fallback(providers: &[ProviderSummary], duration_ms: u64) -> SmartRoutingOutcome {
    SmartRoutingOutcome {
        decision: SmartRoutingDecision {
            relevant_servers: providers.iter().map(|p| p.name.clone()).collect(),
            reasoning: "fallback: routing call failed or was unparsable".into(),
        },
        succeeded: false,
        duration_ms,
    }
}

/// JSON-mode first, with a lenient text-fallback parser for providers that
/// don't honor JSON-mode (§4.8).
fn parse_decision(text: &str) -> Option<SmartRoutingDecision> {
    if let Ok(decision) = serde_json::from_str::<SmartRoutingDecision>(text) {
        return Some(decision);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    serde_json::from_str(&text[start..=end]).ok()
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_only_when_both_thresholds_exceeded() {
        let thresholds = SmartRoutingThresholds {
            max_tools: 30,
            max_servers: 4,
        };
        assert!(should_route(120, 13, &thresholds));
        assert!(!should_route(120, 3, &thresholds));
        assert!(!should_route(10, 13, &thresholds));
    }

    #[test]
    fn parses_decision_embedded_in_surrounding_text() {
        let text = "Sure, here you go: {\"relevant_servers\": [\"aws\"], \"reasoning\": \"cost\"} thanks";
        let decision = parse_decision(text).unwrap();
        assert_eq!(decision.relevant_servers, vec!["aws".to_string()]);
    }
}
