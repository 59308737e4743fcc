// ToolProviderClient (§2 component table, §4.3) — the opaque per-provider
// client. The concrete transport (stdio/SSE/HTTP) is out of scope (§1); this
// crate only needs the shape every transport must expose so discovery and
// invocation can be transport-agnostic.

use async_trait::async_trait;
use conduit_contracts::{ProviderConfig, ToolDefinition};
use serde_json::Value;

use crate::error::Result;

/// A discovered prompt, including its full content — storing metadata
/// alone is a defect the cache contract explicitly forbids (§4.3 step 3).
#[derive(Debug, Clone)]
pub struct PromptInventoryEntry {
    pub name: String,
    pub description: String,
    /// Full prompt content fetched via `get_prompt`, or `None` if the
    /// provider's `GetPrompt` call failed during discovery (metadata-only
    /// fallback, §4.3 step 3 / §4.4).
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResourceInventoryEntry {
    pub name: String,
    pub uri: String,
    pub description: String,
}

/// One provider's full inventory as returned by a single discovery pass.
#[derive(Debug, Clone, Default)]
pub struct ProviderInventory {
    pub tools: Vec<ToolDefinition>,
    pub prompts: Vec<PromptInventoryEntry>,
    pub resources: Vec<ResourceInventoryEntry>,
}

/// Implemented once per transport. `ToolProviderClient` instances are one
/// per provider per session (§5 "one client instance per provider"); the
/// underlying transport's framing buffer must be configured large enough
/// to carry large outputs (§9 "historic defect: default 64 KiB framing").
#[async_trait]
pub trait ToolProviderClient: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>>;

    async fn list_prompts(&self) -> Result<Vec<PromptInventoryEntry>>;

    async fn list_resources(&self) -> Result<Vec<ResourceInventoryEntry>>;

    /// Fetch one prompt's full content live (§4.4 `get_prompt` "server-first").
    async fn get_prompt(&self, name: &str) -> Result<String>;

    async fn get_resource(&self, name: &str) -> Result<String>;

    async fn invoke_tool(&self, tool_name: &str, arguments: &Value) -> Result<String>;
}

/// Builds the right `ToolProviderClient` for a `ProviderConfig`'s
/// transport. Kept as a factory seam so tests can substitute a stub
/// without touching the declarative config model.
pub trait ToolProviderClientFactory: Send + Sync {
    fn build(&self, config: &ProviderConfig) -> Result<Box<dyn ToolProviderClient>>;
}
