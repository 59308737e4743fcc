// Tools-admin and workspace/registry DTOs (§6 "Tools admin", "Workspace",
// "MCP registry"). These are read-mostly views over the tool plane and the
// external MCP registry directory; they carry no invariants of their own
// beyond what the routes that populate them already enforce.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::provider::ProviderStatus;

/// One row of `GET /api/tools` (§6 "served from an in-memory cache...
/// includes servers sorted alphabetically").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServerSummary {
    pub name: String,
    pub status: ProviderStatus,
    pub tool_count: usize,
    pub function_names: Vec<String>,
}

/// `GET /api/tools/detail?server_name=` response (§6 "on-demand detailed
/// schema per provider; caches on first call").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServerDetail {
    pub name: String,
    pub status: ProviderStatus,
    pub tools: Vec<crate::tool::ToolDefinition>,
    pub prompt_names: Vec<String>,
    pub resource_names: Vec<String>,
}

/// One entry returned by the Obsidian-style workspace browser (§6
/// "Workspace (Obsidian-style)").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ObsidianEntry {
    pub name: String,
    pub path: String,
    pub is_folder: bool,
}

/// One server listed by the external MCP registry directory (§6 "MCP
/// registry"). Distinct from `ServerSummary`: this describes a server the
/// operator *could* add to their own config, not one already configured.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct McpRegistryServer {
    pub id: String,
    pub name: String,
    pub description: String,
    pub repository_url: Option<String>,
}

/// Cursor-paginated page of registry servers (§6 "cursor pagination; when
/// the returned cursor equals the request cursor, treat as end-of-list").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct McpRegistryServerPage {
    pub servers: Vec<McpRegistryServer>,
    pub next_cursor: String,
}

/// `GET /api/mcp-registry/servers/{id}/tools` response body; the
/// `X-Cache-Status` header carrying hit/miss is set by the route handler,
/// not modeled here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct McpRegistryToolList {
    pub server_id: String,
    pub tools: Vec<crate::tool::ToolDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_page_end_of_list_is_a_client_side_comparison() {
        let page = McpRegistryServerPage {
            servers: vec![],
            next_cursor: "c1".to_string(),
        };
        let requested_cursor = "c1";
        assert_eq!(page.next_cursor, requested_cursor);
    }
}
