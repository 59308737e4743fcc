// Structured payloads exchanged between PlannerOrchestrator's sub-agents
// (§4.5). Each is produced by `conduit_core::structured::generate` against
// a schema embedded inline here, not derived via reflection (§4.9).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub tool_servers_hint: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub const SCHEMA_JSON: &'static str = r#"{
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "description": {"type": "string"},
                        "tool_servers_hint": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["id", "description"]
                }
            }
        },
        "required": ["steps"]
    }"#;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Complete,
    Continue,
    Refine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub verdict: VerdictKind,
    pub rationale: String,
}

impl Verdict {
    pub const SCHEMA_JSON: &'static str = r#"{
        "type": "object",
        "properties": {
            "verdict": {"type": "string", "enum": ["complete", "continue", "refine"]},
            "rationale": {"type": "string"}
        },
        "required": ["verdict", "rationale"]
    }"#;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub final_text: String,
    pub status: String,
}

/// Produced by the todo-planner / refinement planner (§4.7). A thin
/// wrapper over freeform markdown so `todo.md` stays human-editable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TodoList {
    pub items: Vec<TodoItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub done: bool,
}

impl TodoList {
    pub const SCHEMA_JSON: &'static str = r#"{
        "type": "object",
        "properties": {
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "description": {"type": "string"},
                        "done": {"type": "boolean"}
                    },
                    "required": ["id", "description"]
                }
            }
        },
        "required": ["items"]
    }"#;

    /// Renders as the `todo.md` markdown checklist persisted via workspace
    /// tools (§4.7 "generates a todo list, saves it via workspace tools").
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Todo\n\n");
        for item in &self.items {
            let marker = if item.done { "x" } else { " " };
            out.push_str(&format!("- [{marker}] {} ({})\n", item.description, item.id));
        }
        out
    }

    /// Best-effort parse of a previously saved `todo.md` so the todo-planner
    /// can read "any existing todo.md" before regenerating it.
    pub fn from_markdown(markdown: &str) -> Self {
        let mut items = Vec::new();
        for line in markdown.lines() {
            let trimmed = line.trim();
            let Some(rest) = trimmed
                .strip_prefix("- [x]")
                .map(|r| (r, true))
                .or_else(|| trimmed.strip_prefix("- [ ]").map(|r| (r, false)))
            else {
                continue;
            };
            let (text, done) = rest;
            let text = text.trim();
            let (description, id) = match text.rsplit_once('(') {
                Some((desc, id_part)) if id_part.ends_with(')') => {
                    (desc.trim().to_string(), id_part.trim_end_matches(')').to_string())
                }
                _ => (text.to_string(), format!("item-{}", items.len() + 1)),
            };
            items.push(TodoItem { id, description, done });
        }
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn todo_markdown_round_trips() {
        let list = TodoList {
            items: vec![
                TodoItem { id: "t1".into(), description: "write tests".into(), done: true },
                TodoItem { id: "t2".into(), description: "ship it".into(), done: false },
            ],
        };
        let markdown = list.to_markdown();
        let parsed = TodoList::from_markdown(&markdown);
        assert_eq!(parsed.items.len(), 2);
        assert!(parsed.items[0].done);
        assert!(!parsed.items[1].done);
        assert_eq!(parsed.items[1].id, "t2");
    }
}
