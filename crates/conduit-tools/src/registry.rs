// ToolRegistry (§4.2) — merges custom, virtual, and externally discovered
// tools into one dispatch table. On a same-class name collision,
// construction fails outright; on a cross-class collision the higher
// `ToolClass::precedence()` wins and the shadowed tool is dropped with a
// warning (Custom > Virtual > External).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait as async_trait_attr;
use conduit_contracts::{ToolCall, ToolClass, ToolDefinition, ToolResult};
use serde_json::Value;

use crate::error::{Result, ToolsError};

/// One executable tool, regardless of which class produced it.
#[async_trait_attr]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn invoke(&self, arguments: &Value) -> Result<String>;
}

struct RegisteredTool {
    class: ToolClass,
    handler: Arc<dyn ToolHandler>,
}

pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

pub struct ToolRegistryBuilder {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Adds one tool. Same-name/same-class as an existing entry is a
    /// construction-time error; same-name/different-class defers to
    /// `ToolClass::precedence()`.
    pub fn add(&mut self, handler: Arc<dyn ToolHandler>) -> Result<()> {
        let def = handler.definition();
        let class = def.class;

        match self.tools.get(&def.name) {
            None => {
                self.tools.insert(def.name, RegisteredTool { class, handler });
                Ok(())
            }
            Some(existing) if existing.class == class => {
                Err(ToolsError::RegistryConflict(def.name))
            }
            Some(existing) => {
                if class.precedence() > existing.class.precedence() {
                    tracing::warn!(
                        name = %def.name,
                        winning_class = ?class,
                        shadowed_class = ?existing.class,
                        "tool name collision across classes; higher precedence wins"
                    );
                    self.tools.insert(def.name, RegisteredTool { class, handler });
                } else {
                    tracing::warn!(
                        name = %def.name,
                        incoming_class = ?class,
                        kept_class = ?existing.class,
                        "tool name collision across classes; existing registration kept"
                    );
                }
                Ok(())
            }
        }
    }

    pub fn add_all(&mut self, handlers: impl IntoIterator<Item = Arc<dyn ToolHandler>>) -> Result<()> {
        for handler in handlers {
            self.add(handler)?;
        }
        Ok(())
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<ToolDefinition> {
        self.tools.get(name).map(|t| t.handler.definition())
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let Some(registered) = self.tools.get(&call.name) else {
            return Err(ToolsError::ToolNotFound(call.name.clone()));
        };

        match registered.handler.invoke(&call.arguments).await {
            Ok(content) => Ok(ToolResult::ok(call.id.clone(), content)),
            Err(ToolsError::ExecutionFailed(msg)) => Ok(ToolResult::error(call.id.clone(), msg)),
            Err(other) => Err(other),
        }
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.handler.definition()).collect()
    }
}

/// Bridges `ToolRegistry` into `conduit_core::traits::ToolExecutor` so the
/// turn loop can dispatch without knowing about classes at all.
pub struct RegistryExecutor {
    pub registry: Arc<ToolRegistry>,
    /// When set, every successful tool result is passed through
    /// `substitute_if_large` before it reaches the turn loop (§4.4 "the
    /// dispatcher writes the payload to a content-addressed file and
    /// substitutes a tool result of `{handle, size, preview}`"). `None`
    /// disables substitution entirely (e.g. in tests that assert on raw
    /// tool output).
    pub large_output: Option<Arc<crate::virtual_tools::LargeOutputStore>>,
}

impl RegistryExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry, large_output: None }
    }

    pub fn with_large_output(mut self, store: Arc<crate::virtual_tools::LargeOutputStore>) -> Self {
        self.large_output = Some(store);
        self
    }
}

#[async_trait_attr]
impl conduit_core::traits::ToolExecutor for RegistryExecutor {
    async fn execute(&self, call: &ToolCall) -> conduit_core::error::Result<ToolResult> {
        let mut result = self.registry.execute(call).await.map_err(|err| err.into())?;

        if !result.is_error {
            if let Some(store) = &self.large_output {
                if let Ok(Some(substitution)) = store.substitute_if_large(&result.content).await {
                    let handle = serde_json::from_str::<serde_json::Value>(&substitution)
                        .ok()
                        .and_then(|v| v.get("handle").and_then(|h| h.as_str()).map(str::to_string));
                    result.content = substitution;
                    result.handle = handle;
                }
            }
        }

        Ok(result)
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.tool_definitions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool(&'static str, ToolClass);

    #[async_trait_attr]
    impl ToolHandler for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.0.to_string(),
                description: "echoes".into(),
                parameters: serde_json::json!({}),
                class: self.1,
                provider_name: None,
            }
        }

        async fn invoke(&self, arguments: &Value) -> Result<String> {
            Ok(arguments.to_string())
        }
    }

    #[tokio::test]
    async fn same_class_collision_is_a_construction_error() {
        let mut builder = ToolRegistry::builder();
        builder.add(Arc::new(EchoTool("dup", ToolClass::External))).unwrap();
        let err = builder.add(Arc::new(EchoTool("dup", ToolClass::External))).unwrap_err();
        assert!(matches!(err, ToolsError::RegistryConflict(_)));
    }

    #[tokio::test]
    async fn custom_wins_over_external_on_name_collision() {
        let mut builder = ToolRegistry::builder();
        builder.add(Arc::new(EchoTool("shared", ToolClass::External))).unwrap();
        builder.add(Arc::new(EchoTool("shared", ToolClass::Custom))).unwrap();
        let registry = builder.build();
        assert_eq!(registry.get("shared").unwrap().class, ToolClass::Custom);
    }

    #[tokio::test]
    async fn virtual_does_not_override_custom() {
        let mut builder = ToolRegistry::builder();
        builder.add(Arc::new(EchoTool("shared", ToolClass::Custom))).unwrap();
        builder.add(Arc::new(EchoTool("shared", ToolClass::Virtual))).unwrap();
        let registry = builder.build();
        assert_eq!(registry.get("shared").unwrap().class, ToolClass::Custom);
    }

    #[tokio::test]
    async fn unknown_tool_name_is_not_found() {
        let registry = ToolRegistry::builder().build();
        let call = ToolCall {
            id: "1".into(),
            name: "missing".into(),
            arguments: serde_json::json!({}),
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolsError::ToolNotFound(_)));
    }

    struct BigTool(String);

    #[async_trait_attr]
    impl ToolHandler for BigTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "big".into(),
                description: "returns a lot of text".into(),
                parameters: serde_json::json!({}),
                class: ToolClass::External,
                provider_name: Some("browser".into()),
            }
        }

        async fn invoke(&self, _arguments: &Value) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn oversized_output_is_substituted_with_a_fetchable_handle() {
        use crate::virtual_tools::LargeOutputStore;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LargeOutputStore::new(dir.path(), 8));

        let mut builder = ToolRegistry::builder();
        builder.add(Arc::new(BigTool("x".repeat(100)))).unwrap();
        let registry = Arc::new(builder.build());
        let executor = RegistryExecutor::new(registry).with_large_output(store.clone());

        let call = ToolCall {
            id: "1".into(),
            name: "big".into(),
            arguments: serde_json::json!({}),
        };
        let result = conduit_core::traits::ToolExecutor::execute(&executor, &call)
            .await
            .unwrap();

        assert!(!result.is_error);
        let handle = result.handle.expect("large output should carry a handle");
        let parsed: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(parsed["handle"].as_str().unwrap(), handle);
        assert_eq!(parsed["size"].as_u64().unwrap(), 100);

        let fetched = store.fetch(&handle).await.unwrap();
        assert_eq!(fetched, "x".repeat(100));
    }

    #[tokio::test]
    async fn small_output_passes_through_untouched() {
        use crate::virtual_tools::LargeOutputStore;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LargeOutputStore::new(dir.path(), 1024));

        let mut builder = ToolRegistry::builder();
        builder.add(Arc::new(EchoTool("small", ToolClass::External))).unwrap();
        let registry = Arc::new(builder.build());
        let executor = RegistryExecutor::new(registry).with_large_output(store);

        let call = ToolCall {
            id: "1".into(),
            name: "small".into(),
            arguments: serde_json::json!({"a": 1}),
        };
        let result = conduit_core::traits::ToolExecutor::execute(&executor, &call)
            .await
            .unwrap();
        assert!(result.handle.is_none());
        assert_eq!(result.content, serde_json::json!({"a": 1}).to_string());
    }
}
