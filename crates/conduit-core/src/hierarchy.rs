// Event Hierarchy Tracker (§4.6)
//
// A mutable per-agent tracker: `current_level` and `current_parent_span_id`.
// Start events push depth; end events hold depth steady so that siblings
// emitted after an end (token-usage, a follow-up tool call) land at the
// right level. `conversation_turn` is the one type that is simultaneously
// a start event and a hard reset to level 2, so turns never accumulate
// depth across a long-running conversation.

use conduit_contracts::{Component, Event, EventType};
use uuid::Uuid;

pub struct HierarchyTracker {
    session_id: Uuid,
    trace_id: Uuid,
    current_level: i32,
    current_parent_span_id: Uuid,
    root_span_id: Uuid,
    /// `true` only for a tracker built via `new` — the session's own root,
    /// whose first-ever event has no real parent to point at. A tracker
    /// built via `with_parent` always has a genuine parent span (one the
    /// orchestrator already emitted), so its first event must carry it.
    is_true_root: bool,
    /// Set after the first `record` call. The true-root exception in
    /// `record` applies only while this is still `false` — every event
    /// after the first one points at a real, previously emitted span.
    emitted_first_event: bool,
}

impl HierarchyTracker {
    /// `root_span_id` names the session's own root span; the very first
    /// event of a session has no parent at all (`parent_id = ""`).
    pub fn new(session_id: Uuid, trace_id: Uuid) -> Self {
        let root_span_id = Uuid::now_v7();
        Self {
            session_id,
            trace_id,
            current_level: 0,
            current_parent_span_id: root_span_id,
            root_span_id,
            is_true_root: true,
            emitted_first_event: false,
        }
    }

    /// Builds a tracker whose first event nests under an existing span
    /// instead of starting a new root — used when a subordinate agent
    /// (orchestrator planner/executor/validator) must share its parent's
    /// `trace_id` and report events as children of the parent's span
    /// (§4.5 "events with `parent_id` pointing back to the orchestrator
    /// root span").
    pub fn with_parent(
        session_id: Uuid,
        trace_id: Uuid,
        parent_span_id: Uuid,
        starting_level: i32,
    ) -> Self {
        Self {
            session_id,
            trace_id,
            current_level: starting_level,
            current_parent_span_id: parent_span_id,
            root_span_id: parent_span_id,
            is_true_root: false,
            emitted_first_event: false,
        }
    }

    pub fn root_span_id(&self) -> Uuid {
        self.root_span_id
    }

    /// Build and register the next event, mutating tracker state per the
    /// start/end/level-reset rules, then return the completed envelope.
    pub fn record(
        &mut self,
        event_type: EventType,
        parent_type: Option<EventType>,
        data: serde_json::Value,
    ) -> Event {
        let span_id = Uuid::now_v7();
        let is_root = self.is_true_root && !self.emitted_first_event;
        self.emitted_first_event = true;

        let parent_id = if is_root {
            String::new()
        } else {
            self.current_parent_span_id.to_string()
        };

        let level = if event_type.is_level_reset() {
            2
        } else if event_type.is_start_event() {
            self.current_level + 1
        } else {
            self.current_level
        };

        if event_type.is_level_reset() {
            self.current_level = 2;
            self.current_parent_span_id = span_id;
        } else if event_type.is_start_event() {
            self.current_level = level;
            self.current_parent_span_id = span_id;
        }
        // end events: current_level and current_parent_span_id untouched

        Event {
            id: 0,
            event_type,
            timestamp: chrono::Utc::now(),
            trace_id: self.trace_id,
            span_id,
            parent_id,
            session_id: self.session_id,
            hierarchy_level: level,
            component: event_type.component(),
            parent_type,
            data,
            metadata: None,
        }
    }

    pub fn component_of(event_type: EventType) -> Component {
        event_type.component()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_first_event_of_a_session_has_no_parent() {
        let mut tracker = HierarchyTracker::new(Uuid::now_v7(), Uuid::now_v7());
        let first = tracker.record(EventType::AgentStart, None, serde_json::json!({}));
        assert_eq!(first.parent_id, "");

        let second = tracker.record(EventType::ConversationStart, None, serde_json::json!({}));
        assert_ne!(second.parent_id, "", "only the session's first event is parentless");
        assert_eq!(second.parent_id, first.span_id.to_string());
    }

    #[test]
    fn a_nested_tracker_s_first_event_points_at_the_real_parent_span() {
        let parent_span_id = Uuid::now_v7();
        let mut tracker = HierarchyTracker::with_parent(Uuid::now_v7(), Uuid::now_v7(), parent_span_id, 1);
        let first = tracker.record(EventType::AgentStart, None, serde_json::json!({}));
        assert_eq!(first.parent_id, parent_span_id.to_string());
    }

    #[test]
    fn start_events_increase_level_and_end_events_hold() {
        let mut tracker = HierarchyTracker::new(Uuid::now_v7(), Uuid::now_v7());
        let start = tracker.record(EventType::AgentStart, None, serde_json::json!({}));
        assert_eq!(start.hierarchy_level, 1);

        let conv_start = tracker.record(EventType::ConversationStart, None, serde_json::json!({}));
        assert_eq!(conv_start.hierarchy_level, 2);

        let end = tracker.record(EventType::ConversationEnd, None, serde_json::json!({}));
        assert_eq!(end.hierarchy_level, 2);

        // a sibling emitted right after the end attaches at the same level
        let sibling = tracker.record(EventType::TokenUsage, None, serde_json::json!({}));
        assert_eq!(sibling.hierarchy_level, 2);
    }

    #[test]
    fn conversation_turn_always_resets_to_level_two() {
        let mut tracker = HierarchyTracker::new(Uuid::now_v7(), Uuid::now_v7());
        tracker.record(EventType::AgentStart, None, serde_json::json!({}));
        tracker.record(EventType::ConversationStart, None, serde_json::json!({}));
        tracker.record(EventType::ToolCallStart, None, serde_json::json!({}));
        tracker.record(EventType::ToolCallEnd, None, serde_json::json!({}));

        let turn = tracker.record(EventType::ConversationTurn, None, serde_json::json!({}));
        assert_eq!(turn.hierarchy_level, 2);

        // a second turn resets again, regardless of intervening nesting
        tracker.record(EventType::LlmGenerationStart, None, serde_json::json!({}));
        tracker.record(EventType::ToolCallStart, None, serde_json::json!({}));
        let turn2 = tracker.record(EventType::ConversationTurn, None, serde_json::json!({}));
        assert_eq!(turn2.hierarchy_level, 2);
    }
}
