// Event Protocol (§3 "Event", §4.6 Event Hierarchy Tracker, §9 "one events namespace")
//
// A single tagged-sum event model: one `EventType` enum, one envelope
// (`Event`) carrying hierarchy fields, one `data` payload keyed by type.
// Consumers decode generically by `type` rather than type-switching per
// variant (§9 "plugin-per-event-type display switch" is explicitly avoided).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed set of event types emitted anywhere in the core. Serializes to
/// the exact snake_case strings referenced by the testable scenarios in
/// §8 (e.g. `"conversation_start"`, `"llm_generation_end"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Session lifecycle
    SessionStarted,
    SessionCompleted,
    SessionError,
    SessionStopped,

    // Agent lifecycle (one ConversationAgent instance, simple/react/orchestrator sub-agent)
    AgentStart,
    AgentEnd,

    // Conversation turn loop (§4.1, §4.6)
    ConversationStart,
    ConversationEnd,
    ConversationTurn,

    // LLM calls (§4.1 CALL_LLM)
    LlmGenerationStart,
    LlmGenerationEnd,
    LlmGenerationError,
    LlmFallbackAttempt,
    TokenUsage,

    // Tool dispatch (§4.1 DISPATCH_TOOLS, §4.2)
    ToolCallStart,
    ToolCallEnd,
    ToolCallError,
    ToolCallTimeout,

    // Smart routing (§4.8)
    SmartRoutingStart,
    SmartRoutingEnd,

    // Discovery / tool plane (§4.3)
    DiscoveryStart,
    DiscoveryEnd,
    ComprehensiveCache,
    ProviderDiscoveryError,
    ProviderDegraded,
    ProviderReconnected,
    CacheHit,
    CacheMiss,
    CacheWriteThrough,
    CacheExpired,

    // Virtual tools (§4.4)
    PromptFetchStart,
    PromptFetchEnd,
    ResourceFetchStart,
    ResourceFetchEnd,
    LargeOutputStored,
    LargeOutputRetrieved,
    WorkspaceFileRead,
    WorkspaceFileWrite,
    WorkspaceFilePatch,
    WorkspaceFileList,

    // Structured output (§4.9)
    StructuredOutputStart,
    StructuredOutputEnd,
    StructuredOutputError,

    // Orchestrator mode (§4.5)
    OrchestratorStart,
    OrchestratorEnd,
    OrchestratorIterationStart,
    OrchestratorIterationEnd,
    OrchestratorPlanningStart,
    OrchestratorPlanningEnd,
    OrchestratorExecutionStart,
    OrchestratorExecutionEnd,
    OrchestratorValidationStart,
    OrchestratorValidationEnd,

    // Workflow mode (§4.7)
    WorkflowTodoPlanningStart,
    WorkflowTodoPlanningEnd,
    WorkflowExecutionStart,
    WorkflowExecutionEnd,
    WorkflowValidationStart,
    WorkflowValidationEnd,
    WorkflowRefinementStart,
    WorkflowRefinementEnd,
    RequestHumanFeedback,
    WorkflowApproved,
    WorkflowRegenerated,
    WorkflowRefined,

    // Reliability (§5, §7, §9)
    CircuitBreakerOpened,
    CircuitBreakerClosed,

    // Terminal event (§3 invariant 4, §4.1 Terminal)
    UnifiedCompletion,

    // Catch-all for anything that doesn't fit a named lifecycle (§4.6 "remainder → system")
    Warning,
}

impl EventType {
    /// True for events that push the hierarchy tracker's level (§4.6).
    pub fn is_start_event(self) -> bool {
        matches!(
            self,
            EventType::SessionStarted
                | EventType::AgentStart
                | EventType::ConversationStart
                | EventType::ConversationTurn
                | EventType::LlmGenerationStart
                | EventType::ToolCallStart
                | EventType::SmartRoutingStart
                | EventType::DiscoveryStart
                | EventType::PromptFetchStart
                | EventType::ResourceFetchStart
                | EventType::StructuredOutputStart
                | EventType::OrchestratorStart
                | EventType::OrchestratorIterationStart
                | EventType::OrchestratorPlanningStart
                | EventType::OrchestratorExecutionStart
                | EventType::OrchestratorValidationStart
                | EventType::WorkflowTodoPlanningStart
                | EventType::WorkflowExecutionStart
                | EventType::WorkflowValidationStart
                | EventType::WorkflowRefinementStart
        )
    }

    /// `conversation_turn` is simultaneously a start event and a level reset
    /// to 2 (child of `conversation_start`), regardless of prior nesting
    /// (§4.6 exception).
    pub fn is_level_reset(self) -> bool {
        matches!(self, EventType::ConversationTurn)
    }

    /// Derive the owning component from the event type's name prefix (§3,
    /// §4.6 "component classification").
    pub fn component(self) -> Component {
        use EventType::*;
        match self {
            SessionStarted | SessionCompleted | SessionError | SessionStopped => {
                Component::Query
            }
            AgentStart | AgentEnd => Component::Agent,
            ConversationStart | ConversationEnd | ConversationTurn => Component::Conversation,
            LlmGenerationStart | LlmGenerationEnd | LlmGenerationError | LlmFallbackAttempt
            | TokenUsage => Component::Llm,
            ToolCallStart | ToolCallEnd | ToolCallError | ToolCallTimeout => Component::Tool,
            OrchestratorStart
            | OrchestratorEnd
            | OrchestratorIterationStart
            | OrchestratorIterationEnd
            | OrchestratorPlanningStart
            | OrchestratorPlanningEnd
            | OrchestratorExecutionStart
            | OrchestratorExecutionEnd
            | OrchestratorValidationStart
            | OrchestratorValidationEnd
            | WorkflowTodoPlanningStart
            | WorkflowTodoPlanningEnd
            | WorkflowExecutionStart
            | WorkflowExecutionEnd
            | WorkflowValidationStart
            | WorkflowValidationEnd
            | WorkflowRefinementStart
            | WorkflowRefinementEnd
            | RequestHumanFeedback
            | WorkflowApproved
            | WorkflowRegenerated
            | WorkflowRefined => Component::Orchestrator,
            PromptFetchStart
            | PromptFetchEnd
            | ResourceFetchStart
            | ResourceFetchEnd
            | LargeOutputStored
            | LargeOutputRetrieved
            | WorkspaceFileRead
            | WorkspaceFileWrite
            | WorkspaceFilePatch
            | WorkspaceFileList
            | DiscoveryStart
            | DiscoveryEnd
            | ComprehensiveCache
            | ProviderDiscoveryError
            | ProviderDegraded
            | ProviderReconnected
            | CacheHit
            | CacheMiss
            | CacheWriteThrough
            | CacheExpired
            | SmartRoutingStart
            | SmartRoutingEnd => Component::Tool,
            _ => Component::System,
        }
    }
}

/// Owning component of an event, used for grouping/filtering (§3 "component").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Query,
    Orchestrator,
    Agent,
    Llm,
    Tool,
    Conversation,
    System,
}

/// The standard event envelope (§3 "Event").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub trace_id: Uuid,
    pub span_id: Uuid,
    #[serde(default)]
    pub parent_id: String,
    pub session_id: Uuid,
    pub hierarchy_level: i32,
    pub component: Component,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<EventType>,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Event {
    /// Construct an event with a fresh span id; hierarchy fields are filled
    /// in by the `HierarchyTracker` (conduit-core), not here, so this
    /// constructor leaves them at session-root defaults.
    pub fn new(
        event_type: EventType,
        session_id: Uuid,
        trace_id: Uuid,
        data: impl Serialize,
    ) -> Self {
        Self {
            id: 0,
            event_type,
            timestamp: Utc::now(),
            trace_id,
            span_id: Uuid::now_v7(),
            parent_id: String::new(),
            session_id,
            hierarchy_level: 0,
            component: event_type.component(),
            parent_type: None,
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// ============================================================================
// Per-event data payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationTurnData {
    pub turn: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LlmGenerationStartData {
    pub model: String,
    pub provider: String,
    pub tool_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LlmGenerationEndData {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
    pub has_tool_calls: bool,
    pub tool_call_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LlmGenerationErrorData {
    pub error: String,
    /// one of the taxonomy kinds from §7, e.g. "llm_transient" / "llm_permanent"
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolCallStartData {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolCallEndData {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: serde_json::Value,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolCallErrorData {
    pub tool_call_id: String,
    pub tool_name: String,
    pub error: String,
    /// one of §7's kinds: "tool_not_found" | "tool_execution_failed" | "provider_unavailable"
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SmartRoutingStartData {
    pub total_tools: usize,
    pub total_servers: usize,
    pub max_tools: usize,
    pub max_servers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SmartRoutingEndData {
    pub filtered_tools: usize,
    pub relevant_servers: Vec<String>,
    pub reasoning: String,
    pub duration_ms: u64,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComprehensiveCacheData {
    pub providers: Vec<ProviderCacheSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderCacheSummary {
    pub provider_name: String,
    pub status: String, // "hit" | "miss" | "error"
    pub tool_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StructuredOutputErrorData {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestHumanFeedbackData {
    pub todo_file_path: String,
    pub todos: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnifiedCompletionData {
    pub agent_type: String,
    pub agent_mode: String,
    pub question: String,
    pub final_result: String,
    /// "completed" | "error" | "timeout" | "max_turns_reached"
    pub status: String,
    pub duration_ms: u64,
    pub turns: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_serializes_to_spec_strings() {
        assert_eq!(
            serde_json::to_value(EventType::ConversationStart).unwrap(),
            "conversation_start"
        );
        assert_eq!(
            serde_json::to_value(EventType::LlmGenerationEnd).unwrap(),
            "llm_generation_end"
        );
        assert_eq!(
            serde_json::to_value(EventType::ToolCallStart).unwrap(),
            "tool_call_start"
        );
        assert_eq!(
            serde_json::to_value(EventType::UnifiedCompletion).unwrap(),
            "unified_completion"
        );
        assert_eq!(
            serde_json::to_value(EventType::RequestHumanFeedback).unwrap(),
            "request_human_feedback"
        );
        assert_eq!(
            serde_json::to_value(EventType::ComprehensiveCache).unwrap(),
            "comprehensive_cache"
        );
    }

    #[test]
    fn conversation_turn_is_a_start_event_and_a_level_reset() {
        assert!(EventType::ConversationTurn.is_start_event());
        assert!(EventType::ConversationTurn.is_level_reset());
        assert!(!EventType::ToolCallEnd.is_start_event());
        assert!(!EventType::ToolCallEnd.is_level_reset());
    }

    #[test]
    fn component_derives_from_type_prefix() {
        assert_eq!(EventType::LlmGenerationStart.component(), Component::Llm);
        assert_eq!(EventType::ToolCallEnd.component(), Component::Tool);
        assert_eq!(
            EventType::OrchestratorPlanningStart.component(),
            Component::Orchestrator
        );
        assert_eq!(EventType::Warning.component(), Component::System);
    }
}
