//! Tool plane: provider discovery cache, tool registry dispatch, smart
//! routing catalogue inputs, and virtual tools. Everything here implements
//! the seams `conduit-core` defines (`ToolExecutor`) without the turn loop
//! knowing which class — custom, virtual, or discovered — served a call.

pub mod circuit;
pub mod discovery;
pub mod error;
pub mod provider_client;
pub mod registry;
pub mod virtual_tools;

pub use circuit::{CircuitBreakerConfig, CircuitState, ProviderBreaker};
pub use discovery::{DiscoveryCache, DiscoverySummary, ProviderCacheOutcome};
pub use error::{Result, ToolsError};
pub use provider_client::{ProviderInventory, ToolProviderClient, ToolProviderClientFactory};
pub use registry::{RegistryExecutor, ToolHandler, ToolRegistry, ToolRegistryBuilder};
pub use virtual_tools::{
    GetPromptTool, GetResourceTool, LargeOutputFetchTool, LargeOutputStore, WorkspaceTools,
    DEFAULT_LARGE_OUTPUT_THRESHOLD_BYTES,
};
