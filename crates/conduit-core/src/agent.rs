// ConversationAgent turn loop (§4.1)
//
// BUILD_MESSAGES -> CALL_LLM -> CLASSIFY -> DISPATCH_TOOLS -> BUILD_MESSAGES,
// until a termination rule fires or max_turns is reached. The agent mutates
// only its own `messages` vector; all events flow through `EventEmitter`,
// all persistence through `MessageStore` — the loop itself never touches a
// database or the filesystem.

use std::sync::Arc;
use std::time::Instant;

use conduit_contracts::{Event, EventType, ToolCall, UnifiedCompletionData};
use regex::RegexBuilder;
use uuid::Uuid;

use crate::atoms::{Atom, CallModelAtom, CallModelInput, DispatchToolsAtom, DispatchToolsInput};
use crate::config::{AgentConfig, ReactMode};
use crate::error::{CoreError, Result};
use crate::hierarchy::HierarchyTracker;
use crate::llm::LlmMessage;
use crate::message::ConversationMessage;
use crate::router::{self, ProviderSummary};
use crate::traits::{EventEmitter, ToolExecutor};

/// The canonical "Final Answer:" markers a ReAct response is scanned for,
/// matched case-insensitively (§4.1, GLOSSARY "Final Answer marker").
pub const FINAL_ANSWER_MARKERS: &[&str] = &["Final Answer:", "FINAL ANSWER:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Error,
    MaxTurnsReached,
    Cancelled,
}

impl TerminalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalStatus::Completed => "completed",
            TerminalStatus::Error => "error",
            TerminalStatus::MaxTurnsReached => "max_turns_reached",
            TerminalStatus::Cancelled => "cancelled",
        }
    }
}

pub struct AgentOutcome {
    pub final_text: String,
    pub status: TerminalStatus,
    pub turns: u32,
    pub messages: Vec<ConversationMessage>,
}

/// Result of running the turn loop to a terminal status, before the
/// session's terminal event has been emitted.
struct ConversationRun {
    final_text: String,
    status: TerminalStatus,
    turns: u32,
    started_at: Instant,
}

pub struct ConversationAgent {
    config: AgentConfig,
    session_id: Uuid,
    trace_id: Uuid,
    messages: Vec<ConversationMessage>,
    hierarchy: HierarchyTracker,
    call_model: CallModelAtom,
    dispatch_tools: DispatchToolsAtom,
    emitter: Arc<dyn EventEmitter>,
    tool_executor: Arc<dyn ToolExecutor>,
    /// Frozen result of the one-shot `SmartRouter` call (§4.8). `None` means
    /// routing hasn't run yet, isn't enabled, or didn't clear the dual
    /// threshold — in all three cases every tool stays visible.
    allowed_providers: Option<Vec<String>>,
    /// `true` for agents built via `new_nested` (planner/executor/validator
    /// sub-agents sharing a parent orchestrator's `session_id`). Exactly one
    /// agent per session emits `unified_completion` (§3 Invariant 4); a
    /// nested sub-agent emits `agent_end` instead.
    is_nested: bool,
}

impl ConversationAgent {
    pub fn new(
        config: AgentConfig,
        session_id: Uuid,
        trace_id: Uuid,
        call_model: CallModelAtom,
        tool_executor: Arc<dyn ToolExecutor>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let dispatch_tools = DispatchToolsAtom::new(tool_executor.clone());
        Self {
            config,
            session_id,
            trace_id,
            messages: Vec::new(),
            hierarchy: HierarchyTracker::new(session_id, trace_id),
            call_model,
            dispatch_tools,
            emitter,
            tool_executor,
            allowed_providers: None,
            is_nested: false,
        }
    }

    /// Builds an agent whose events nest under an existing span rather than
    /// starting a new root — used by orchestrator modes to run planner,
    /// executor, and validator sub-agents under one parent trace (§4.5).
    #[allow(clippy::too_many_arguments)]
    pub fn new_nested(
        config: AgentConfig,
        session_id: Uuid,
        trace_id: Uuid,
        parent_span_id: Uuid,
        starting_level: i32,
        call_model: CallModelAtom,
        tool_executor: Arc<dyn ToolExecutor>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let dispatch_tools = DispatchToolsAtom::new(tool_executor.clone());
        Self {
            config,
            session_id,
            trace_id,
            messages: Vec::new(),
            hierarchy: HierarchyTracker::with_parent(session_id, trace_id, parent_span_id, starting_level),
            call_model,
            dispatch_tools,
            emitter,
            tool_executor,
            allowed_providers: None,
            is_nested: true,
        }
    }

    pub fn root_span_id(&self) -> Uuid {
        self.hierarchy.root_span_id()
    }

    /// Seeds the frozen provider filter directly, bypassing the `SmartRouter`
    /// LLM call, when the caller already knows which providers matter (§4.5
    /// "ExecutionAgent.Invoke(step) ... with tool-server hint as smart-
    /// routing seed"). A no-op for an empty hint, so a step with no hint
    /// falls through to the normal threshold-gated routing call.
    pub fn seed_allowed_providers(&mut self, hint: Vec<String>) {
        if !hint.is_empty() {
            self.allowed_providers = Some(hint);
        }
    }

    /// Single-shot entry point (§4.1 `Invoke`).
    pub async fn invoke(&mut self, question: impl Into<String>) -> Result<AgentOutcome> {
        self.messages.push(ConversationMessage::user(question.into()));
        self.run().await
    }

    /// Continuation entry point (§4.1 `InvokeWithHistory`).
    pub async fn invoke_with_history(
        &mut self,
        prior: Vec<ConversationMessage>,
        question: impl Into<String>,
    ) -> Result<AgentOutcome> {
        self.messages = prior;
        self.messages.push(ConversationMessage::user(question.into()));
        self.run().await
    }

    /// `InvokeStructured[T]` (§4.1, §4.9): runs a normal conversation to
    /// completion, then performs a second JSON-mode call with the caller's
    /// schema embedded in the prompt and parses the result into `T`. Used
    /// directly by `ConversationAgent` callers and by orchestrator
    /// sub-agents producing a `Plan`/`Verdict` structured payload.
    ///
    /// Runs the conversation via `run_conversation` rather than `invoke`, so
    /// the terminal event (`unified_completion`/`agent_end`) is emitted only
    /// once, *after* the structured-output step — not in between, which
    /// would put `structured_output_start`/`end` after the session's
    /// terminal event (§3 Invariant 4 "last event of every session").
    pub async fn invoke_structured<T: serde::de::DeserializeOwned>(
        &mut self,
        question: impl Into<String>,
        schema_json: &str,
    ) -> Result<T> {
        self.messages.push(ConversationMessage::user(question.into()));
        let run = self.run_conversation().await;

        self.emit(EventType::StructuredOutputStart, serde_json::json!({})).await;

        let prompt = format!(
            "Respond with JSON only, matching exactly this JSON Schema:\n{schema_json}\n\n\
             Conversation result to structure: {}",
            run.final_text
        );

        let result = match self.call_model.complete_structured(&prompt).await {
            Ok(text) => match serde_json::from_str::<T>(&text) {
                Ok(value) => {
                    self.emit(EventType::StructuredOutputEnd, serde_json::json!({})).await;
                    Ok(value)
                }
                Err(err) => {
                    let message = format!("structured output did not validate against schema: {err}");
                    self.emit(
                        EventType::StructuredOutputError,
                        serde_json::json!({ "error": message }),
                    )
                    .await;
                    Err(CoreError::BadInput(message))
                }
            },
            Err(err) => {
                self.emit(
                    EventType::StructuredOutputError,
                    serde_json::json!({ "error": err.to_string() }),
                )
                .await;
                Err(err)
            }
        };

        self.emit_terminal(&run).await;
        result
    }

    async fn emit(&mut self, event_type: EventType, data: serde_json::Value) -> Event {
        let event = self.hierarchy.record(event_type, None, data);
        let _ = self.emitter.emit(event.clone()).await;
        event
    }

    /// Runs at most once per conversation, right after `ConversationStart`
    /// and before the first `CALL_LLM` (§4.8). Freezes `allowed_providers`
    /// for the rest of the agent's lifetime — later turns never re-route.
    async fn maybe_run_smart_routing(&mut self) {
        if !self.config.enable_smart_routing || self.allowed_providers.is_some() {
            return;
        }

        let catalogue = self.tool_executor.provider_catalogue();
        let total_tools = self.tool_executor.tool_definitions().len();
        let total_servers = catalogue.len();

        if !router::should_route(total_tools, total_servers, &self.config.smart_routing_thresholds) {
            return;
        }

        let Some(provider) = self.call_model.primary_provider() else {
            tracing::warn!("smart routing enabled but no LLM provider available; skipping");
            return;
        };

        self.emit(
            EventType::SmartRoutingStart,
            serde_json::json!({
                "total_tools": total_tools,
                "total_servers": total_servers,
                "max_tools": self.config.smart_routing_thresholds.max_tools,
                "max_servers": self.config.smart_routing_thresholds.max_servers,
            }),
        )
        .await;

        let summaries: Vec<ProviderSummary> = catalogue
            .into_iter()
            .map(|(name, tool_count, sample_tools)| ProviderSummary {
                name,
                tool_count,
                sample_tools,
            })
            .collect();

        let outcome = router::route(provider, &self.messages, &summaries).await;
        let filtered_tools = self
            .tool_executor
            .tool_definitions_for(Some(&outcome.decision.relevant_servers))
            .len();

        self.emit(
            EventType::SmartRoutingEnd,
            serde_json::json!({
                "filtered_tools": filtered_tools,
                "relevant_servers": outcome.decision.relevant_servers,
                "reasoning": outcome.decision.reasoning,
                "duration_ms": outcome.duration_ms,
                "success": outcome.succeeded,
            }),
        )
        .await;

        self.allowed_providers = Some(outcome.decision.relevant_servers);
    }

    async fn run(&mut self) -> Result<AgentOutcome> {
        let run = self.run_conversation().await;
        self.emit_terminal(&run).await;

        Ok(AgentOutcome {
            final_text: run.final_text,
            status: run.status,
            turns: run.turns,
            messages: self.messages.clone(),
        })
    }

    /// Runs BUILD_MESSAGES -> CALL_LLM -> CLASSIFY -> DISPATCH_TOOLS to a
    /// terminal status, but does *not* emit the terminal event itself —
    /// callers that need to do more work in the same session before closing
    /// it out (`invoke_structured`) call `emit_terminal` themselves once
    /// everything else has happened.
    async fn run_conversation(&mut self) -> ConversationRun {
        let start = Instant::now();
        self.emit(EventType::ConversationStart, serde_json::json!({})).await;

        self.maybe_run_smart_routing().await;

        let mut turn: u32 = 0;
        let mut last_text = String::new();

        let (final_text, status) = loop {
            if turn >= self.config.max_turns {
                break (last_text.clone(), TerminalStatus::MaxTurnsReached);
            }
            turn += 1;

            self.emit(
                EventType::ConversationTurn,
                serde_json::json!({ "turn": turn }),
            )
            .await;

            let llm_messages: Vec<LlmMessage> = self.build_llm_messages();
            let tools = self
                .tool_executor
                .tool_definitions_for(self.allowed_providers.as_deref());

            self.emit(
                EventType::LlmGenerationStart,
                serde_json::json!({
                    "model": self.config.model,
                    "tool_count": tools.len(),
                }),
            )
            .await;

            let call_result = self
                .call_model
                .execute(CallModelInput {
                    messages: llm_messages,
                    tools,
                    temperature: self.config.temperature,
                })
                .await;

            let call_output = match call_result {
                Ok(output) => output,
                Err(err) => {
                    self.emit(
                        EventType::LlmGenerationError,
                        serde_json::json!({ "error": err.to_string(), "kind": err.kind() }),
                    )
                    .await;
                    break (last_text, TerminalStatus::Error);
                }
            };

            let response = call_output.response;
            last_text = response.text.clone();

            self.emit(
                EventType::LlmGenerationEnd,
                serde_json::json!({
                    "model": call_output.model,
                    "has_tool_calls": response.has_tool_calls(),
                    "tool_call_count": response.tool_calls.len(),
                    "prompt_tokens": response.usage.prompt_tokens,
                    "completion_tokens": response.usage.completion_tokens,
                }),
            )
            .await;

            // CLASSIFY
            if response.has_tool_calls() {
                self.messages.push(ConversationMessage::assistant_with_tool_calls(
                    response.text.clone(),
                    response.tool_calls.clone(),
                ));
                self.dispatch_tool_calls(response.tool_calls).await;
                continue;
            }

            match self.config.mode {
                ReactMode::Simple => break (response.text, TerminalStatus::Completed),
                ReactMode::React => {
                    if let Some(answer) = extract_final_answer(&response.text) {
                        break (answer, TerminalStatus::Completed);
                    }
                    self.messages.push(ConversationMessage::assistant(response.text));
                }
            }
        };

        self.messages.push(ConversationMessage::assistant(final_text.clone()));

        ConversationRun {
            final_text,
            status,
            turns: turn,
            started_at: start,
        }
    }

    /// Emits this session's terminal event (§3 Invariant 4: exactly one
    /// `unified_completion`, always last). A `new_nested` sub-agent emits
    /// `agent_end` instead, since it shares its parent orchestrator's
    /// `session_id` and the orchestrator owns the session's single
    /// `unified_completion`.
    async fn emit_terminal(&mut self, run: &ConversationRun) {
        let completion = UnifiedCompletionData {
            agent_type: "conversation_agent".into(),
            agent_mode: self.config.agent_mode.to_string(),
            question: self
                .messages
                .first()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            final_result: run.final_text.clone(),
            status: run.status.as_str().to_string(),
            duration_ms: run.started_at.elapsed().as_millis() as u64,
            turns: run.turns,
            error: None,
        };
        let event_type = if self.is_nested {
            EventType::AgentEnd
        } else {
            EventType::UnifiedCompletion
        };
        self.emit(event_type, serde_json::to_value(completion).unwrap_or(serde_json::Value::Null))
            .await;
    }

    async fn dispatch_tool_calls(&mut self, tool_calls: Vec<ToolCall>) {
        for call in tool_calls {
            self.emit(
                EventType::ToolCallStart,
                serde_json::json!({
                    "tool_call_id": call.id,
                    "tool_name": call.name,
                    "arguments": call.arguments,
                }),
            )
            .await;

            let started = Instant::now();
            let outcome = self
                .dispatch_tools
                .execute(DispatchToolsInput {
                    tool_call: call.clone(),
                    tool_timeout: self.config.tool_timeout,
                })
                .await;

            match outcome {
                Ok(output) if output.timed_out => {
                    self.emit(
                        EventType::ToolCallTimeout,
                        serde_json::json!({
                            "tool_call_id": call.id,
                            "tool_name": call.name,
                            "error": output.result.content,
                            "kind": "tool_execution_failed",
                        }),
                    )
                    .await;
                    self.messages.push(ConversationMessage::tool_result(&output.result));
                }
                Ok(output) if output.result.is_error => {
                    self.emit(
                        EventType::ToolCallError,
                        serde_json::json!({
                            "tool_call_id": call.id,
                            "tool_name": call.name,
                            "error": output.result.content,
                            "kind": "tool_execution_failed",
                        }),
                    )
                    .await;
                    self.messages.push(ConversationMessage::tool_result(&output.result));
                }
                Ok(output) => {
                    self.emit(
                        EventType::ToolCallEnd,
                        serde_json::json!({
                            "tool_call_id": call.id,
                            "tool_name": call.name,
                            "result": output.result.content,
                            "duration_ms": started.elapsed().as_millis() as u64,
                        }),
                    )
                    .await;
                    self.messages.push(ConversationMessage::tool_result(&output.result));
                }
                Err(err) => {
                    self.emit(
                        EventType::ToolCallError,
                        serde_json::json!({
                            "tool_call_id": call.id,
                            "tool_name": call.name,
                            "error": err.to_string(),
                            "kind": err.kind(),
                        }),
                    )
                    .await;
                    let result = conduit_contracts::ToolResult::error(call.id.clone(), err.to_string());
                    self.messages.push(ConversationMessage::tool_result(&result));
                }
            }
        }
    }

    fn build_llm_messages(&self) -> Vec<LlmMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if let Some(prompt) = &self.config.system_prompt {
            out.push(LlmMessage {
                role: crate::llm::LlmMessageRole::System,
                content: prompt.clone(),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        out.extend(self.messages.iter().map(LlmMessage::from));
        out
    }
}

/// Case-insensitive scan for one of the canonical Final Answer markers,
/// returning the trailing text (§4.1 CLASSIFY, GLOSSARY).
pub fn extract_final_answer(text: &str) -> Option<String> {
    for marker in FINAL_ANSWER_MARKERS {
        let pattern = format!(r"(?i){}", regex::escape(marker));
        let re = RegexBuilder::new(&pattern).build().ok()?;
        if let Some(m) = re.find(text) {
            return Some(text[m.end()..].trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_after_final_answer_marker_case_insensitively() {
        let text = "I thought about it.\nfinal answer: the sky is blue";
        assert_eq!(extract_final_answer(text).unwrap(), "the sky is blue");
    }

    #[test]
    fn returns_none_without_marker() {
        assert!(extract_final_answer("still thinking").is_none());
    }

    #[test]
    fn terminal_status_strings_match_spec_vocabulary() {
        assert_eq!(TerminalStatus::Completed.as_str(), "completed");
        assert_eq!(TerminalStatus::MaxTurnsReached.as_str(), "max_turns_reached");
        assert_eq!(TerminalStatus::Error.as_str(), "error");
    }

    // --- Smart routing wiring (§4.8, testable property 5) ---

    use crate::llm::{LlmResponse, LlmUsage};
    use conduit_contracts::{AgentMode, ToolClass, ToolDefinition, ToolResult};
    use std::sync::Mutex;

    struct RecordingEmitter(Mutex<Vec<Event>>);

    #[async_trait::async_trait]
    impl EventEmitter for RecordingEmitter {
        async fn emit(&self, event: Event) -> Result<()> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct FixedToolExecutor(Vec<ToolDefinition>);

    #[async_trait::async_trait]
    impl crate::traits::ToolExecutor for FixedToolExecutor {
        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            Ok(ToolResult::ok(call.id.clone(), "ok"))
        }

        fn tool_definitions(&self) -> Vec<ToolDefinition> {
            self.0.clone()
        }
    }

    fn many_tools(providers: usize, per_provider: usize) -> Vec<ToolDefinition> {
        let mut out = Vec::new();
        for p in 0..providers {
            for t in 0..per_provider {
                out.push(ToolDefinition {
                    name: format!("p{p}_tool{t}"),
                    description: "does a thing".into(),
                    parameters: serde_json::json!({}),
                    class: ToolClass::External,
                    provider_name: Some(format!("p{p}")),
                });
            }
        }
        out
    }

    /// Answers JSON-mode calls (the router) with a fixed decision and every
    /// other call with a plain-text, no-tool-calls response so `simple` mode
    /// terminates on the first turn.
    struct ScriptedProvider;

    #[async_trait::async_trait]
    impl crate::llm::LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            _messages: &[LlmMessage],
            config: &crate::llm::LlmCallConfig,
        ) -> Result<LlmResponse> {
            let text = match config.response_format {
                crate::llm::ResponseFormat::Json => {
                    r#"{"relevant_servers": ["p0", "p1"], "reasoning": "most relevant"}"#.to_string()
                }
                crate::llm::ResponseFormat::Text => "all done".to_string(),
            };
            Ok(LlmResponse {
                text,
                tool_calls: Vec::new(),
                usage: LlmUsage::default(),
                finish_reason: Some("stop".into()),
            })
        }
    }

    fn scripted_agent(tools: Vec<ToolDefinition>) -> (ConversationAgent, Arc<RecordingEmitter>) {
        let call_model = CallModelAtom::new(
            vec![Box::new(ScriptedProvider)],
            crate::retry::FallbackChain::single("mock", "mock-model"),
        );
        let tool_executor: Arc<dyn crate::traits::ToolExecutor> = Arc::new(FixedToolExecutor(tools));
        let emitter = Arc::new(RecordingEmitter(Mutex::new(Vec::new())));
        let config = AgentConfig {
            agent_mode: AgentMode::Simple,
            ..AgentConfig::new("mock-model")
        };
        let agent = ConversationAgent::new(
            config,
            Uuid::now_v7(),
            Uuid::now_v7(),
            call_model,
            tool_executor,
            emitter.clone(),
        );
        (agent, emitter)
    }

    #[tokio::test]
    async fn smart_routing_runs_once_and_freezes_the_filtered_tool_set() {
        // 5 providers * 10 tools = 50 tools clears both default thresholds
        // (max_tools=30, max_servers=4).
        let (mut agent, emitter) = scripted_agent(many_tools(5, 10));

        agent.invoke("investigate something").await.unwrap();

        assert_eq!(agent.allowed_providers, Some(vec!["p0".to_string(), "p1".to_string()]));

        let events = emitter.0.lock().unwrap();
        let starts = events.iter().filter(|e| e.event_type == EventType::SmartRoutingStart).count();
        let ends = events.iter().filter(|e| e.event_type == EventType::SmartRoutingEnd).count();
        assert_eq!(starts, 1, "routing must run exactly once per conversation");
        assert_eq!(ends, 1);

        let end_data = events
            .iter()
            .find(|e| e.event_type == EventType::SmartRoutingEnd)
            .unwrap();
        assert_eq!(end_data.data["filtered_tools"], serde_json::json!(20));
        assert_eq!(end_data.data["success"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn smart_routing_skipped_under_threshold() {
        let (mut agent, emitter) = scripted_agent(many_tools(2, 3));

        agent.invoke("hello").await.unwrap();

        assert_eq!(agent.allowed_providers, None);
        let events = emitter.0.lock().unwrap();
        assert!(!events.iter().any(|e| e.event_type == EventType::SmartRoutingStart));
    }

    #[tokio::test]
    async fn seeded_hint_bypasses_the_routing_call_entirely() {
        let (mut agent, emitter) = scripted_agent(many_tools(5, 10));
        agent.seed_allowed_providers(vec!["p3".to_string()]);

        agent.invoke("do the step").await.unwrap();

        assert_eq!(agent.allowed_providers, Some(vec!["p3".to_string()]));
        let events = emitter.0.lock().unwrap();
        assert!(
            !events.iter().any(|e| e.event_type == EventType::SmartRoutingStart),
            "a pre-seeded hint must skip the routing LLM call"
        );
    }

    // --- Terminal event placement (§3 Invariant 4, testable property 4) ---

    fn scripted_nested_agent() -> (ConversationAgent, Arc<RecordingEmitter>) {
        let call_model = CallModelAtom::new(
            vec![Box::new(ScriptedProvider)],
            crate::retry::FallbackChain::single("mock", "mock-model"),
        );
        let tool_executor: Arc<dyn crate::traits::ToolExecutor> = Arc::new(FixedToolExecutor(Vec::new()));
        let emitter = Arc::new(RecordingEmitter(Mutex::new(Vec::new())));
        let config = AgentConfig {
            agent_mode: AgentMode::Orchestrator,
            ..AgentConfig::new("mock-model")
        };
        let agent = ConversationAgent::new_nested(
            config,
            Uuid::now_v7(),
            Uuid::now_v7(),
            Uuid::now_v7(),
            1,
            call_model,
            tool_executor,
            emitter.clone(),
        );
        (agent, emitter)
    }

    #[tokio::test]
    async fn root_agent_emits_unified_completion_as_its_last_event() {
        let (mut agent, emitter) = scripted_agent(Vec::new());
        agent.invoke("hello").await.unwrap();

        let events = emitter.0.lock().unwrap();
        assert_eq!(events.last().unwrap().event_type, EventType::UnifiedCompletion);
        assert!(!events.iter().any(|e| e.event_type == EventType::AgentEnd));
    }

    #[tokio::test]
    async fn nested_agent_emits_agent_end_instead_of_unified_completion() {
        let (mut agent, emitter) = scripted_nested_agent();
        agent.invoke("do a sub-step").await.unwrap();

        let events = emitter.0.lock().unwrap();
        assert_eq!(events.last().unwrap().event_type, EventType::AgentEnd);
        assert!(
            !events.iter().any(|e| e.event_type == EventType::UnifiedCompletion),
            "a nested sub-agent must never emit the session's unified_completion"
        );
    }

    #[tokio::test]
    async fn invoke_structured_emits_terminal_event_after_structured_output_events() {
        let (mut agent, emitter) = scripted_agent(Vec::new());

        let _value: serde_json::Value = agent
            .invoke_structured("summarize this", r#"{"type":"object"}"#)
            .await
            .unwrap();

        let events = emitter.0.lock().unwrap();
        assert_eq!(
            events.last().unwrap().event_type,
            EventType::UnifiedCompletion,
            "unified_completion must be the session's last event even when invoke_structured runs"
        );
        let structured_end_index = events
            .iter()
            .position(|e| e.event_type == EventType::StructuredOutputEnd)
            .expect("structured_output_end must be emitted");
        let completion_index = events.len() - 1;
        assert!(structured_end_index < completion_index);

        let unified_completion_count = events
            .iter()
            .filter(|e| e.event_type == EventType::UnifiedCompletion)
            .count();
        assert_eq!(unified_completion_count, 1, "exactly one unified_completion per session");
    }
}
