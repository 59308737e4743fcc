// Pluggable backends for the turn loop (§4.10 EventBus, §4.11 PersistenceStore,
// §4.2 ToolRegistry). conduit-api wires the production implementations;
// tests use in-memory ones.

use async_trait::async_trait;
use conduit_contracts::{Event, ToolCall, ToolDefinition, ToolResult};
use uuid::Uuid;

use crate::error::Result;
use crate::message::ConversationMessage;

/// Accepts emitted events from any component in a session. The hot path
/// must not allocate unnecessarily (§4.10) — implementations should avoid
/// cloning `Event` more than once per fan-out target.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: Event) -> Result<()>;
}

/// Durable conversation history, keyed by session.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, session_id: Uuid, message: ConversationMessage) -> Result<()>;

    async fn load(&self, session_id: Uuid) -> Result<Vec<ConversationMessage>>;
}

/// Executes a single resolved tool call. `ToolRegistry` (conduit-tools)
/// implements this by dispatching to the custom/virtual/external class
/// that owns the name; the turn loop never sees the distinction.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Every tool definition known to the registry, unfiltered.
    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    /// Providers behind the registry's external tools, grouped for the
    /// `SmartRouter` catalogue prompt (§4.8): name, total tool count, and a
    /// handful of `(name, description)` samples. Virtual/custom tools carry
    /// no `provider_name` and are intentionally excluded — they are always
    /// available regardless of routing (§4.8 only filters *providers*).
    fn provider_catalogue(&self) -> Vec<(String, usize, Vec<(String, String)>)> {
        let mut by_provider: std::collections::BTreeMap<String, Vec<ToolDefinition>> =
            std::collections::BTreeMap::new();
        for def in self.tool_definitions() {
            if let Some(provider) = &def.provider_name {
                by_provider.entry(provider.clone()).or_default().push(def);
            }
        }
        by_provider
            .into_iter()
            .map(|(name, defs)| {
                let samples = defs
                    .iter()
                    .take(5)
                    .map(|d| (d.name.clone(), d.description.clone()))
                    .collect();
                (name, defs.len(), samples)
            })
            .collect()
    }

    /// Tool definitions visible to the LLM this turn. When `allowed_providers`
    /// is `Some`, external tools are kept only if their provider is in the
    /// set; virtual/custom tools (no `provider_name`) always pass through.
    /// `None` means routing never ran (or fell back) — everything is visible.
    fn tool_definitions_for(&self, allowed_providers: Option<&[String]>) -> Vec<ToolDefinition> {
        match allowed_providers {
            None => self.tool_definitions(),
            Some(allowed) => self
                .tool_definitions()
                .into_iter()
                .filter(|def| match &def.provider_name {
                    Some(provider) => allowed.iter().any(|p| p == provider),
                    None => true,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_contracts::ToolClass;

    struct FixedExecutor(Vec<ToolDefinition>);

    #[async_trait]
    impl ToolExecutor for FixedExecutor {
        async fn execute(&self, _call: &ToolCall) -> Result<ToolResult> {
            unimplemented!("not exercised by these tests")
        }

        fn tool_definitions(&self) -> Vec<ToolDefinition> {
            self.0.clone()
        }
    }

    fn def(name: &str, provider: Option<&str>) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: format!("does {name}"),
            parameters: serde_json::json!({}),
            class: if provider.is_some() { ToolClass::External } else { ToolClass::Virtual },
            provider_name: provider.map(str::to_string),
        }
    }

    #[test]
    fn provider_catalogue_groups_by_provider_and_skips_virtual_tools() {
        let executor = FixedExecutor(vec![
            def("get_prompt", None),
            def("s3_list", Some("aws")),
            def("s3_get", Some("aws")),
            def("gh_search", Some("github")),
        ]);

        let catalogue = executor.provider_catalogue();
        assert_eq!(catalogue.len(), 2);
        let aws = catalogue.iter().find(|(name, ..)| name == "aws").unwrap();
        assert_eq!(aws.1, 2);
    }

    #[test]
    fn unfiltered_definitions_include_everything() {
        let executor = FixedExecutor(vec![def("get_prompt", None), def("s3_list", Some("aws"))]);
        assert_eq!(executor.tool_definitions_for(None).len(), 2);
    }

    #[test]
    fn filtered_definitions_keep_virtual_tools_and_allowed_providers_only() {
        let executor = FixedExecutor(vec![
            def("get_prompt", None),
            def("s3_list", Some("aws")),
            def("gh_search", Some("github")),
        ]);

        let filtered = executor.tool_definitions_for(Some(&["aws".to_string()]));
        let names: Vec<_> = filtered.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"get_prompt"));
        assert!(names.contains(&"s3_list"));
        assert!(!names.contains(&"gh_search"));
    }
}
