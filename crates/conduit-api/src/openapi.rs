// OpenAPI aggregation: one `#[derive(OpenApi)]` struct naming every route
// module's handlers and DTOs, served at `/swagger-ui`.

use utoipa::OpenApi;

use crate::chat_history;
use crate::mcp_registry;
use crate::presets;
use crate::query;
use crate::tools_admin;
use crate::workflow_routes;
use crate::workspace_routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        query::post_query,
        query::get_events,
        query::post_session_stop,
        chat_history::create_session,
        chat_history::list_sessions,
        chat_history::get_session,
        chat_history::update_session,
        chat_history::delete_session,
        chat_history::replay_session_events,
        chat_history::search_events,
        presets::create_preset,
        presets::list_presets,
        presets::get_preset,
        presets::update_preset,
        presets::delete_preset,
        workflow_routes::create_workflow,
        workflow_routes::get_workflow_status,
        workflow_routes::update_workflow,
        tools_admin::list_tools,
        tools_admin::tool_detail,
        workspace_routes::list_root,
        workspace_routes::list_folder,
        mcp_registry::list_servers,
        mcp_registry::get_server,
        mcp_registry::server_tools,
    ),
    components(schemas(
        conduit_contracts::Session,
        conduit_contracts::SessionStatus,
        conduit_contracts::AgentMode,
        conduit_contracts::FileContextEntry,
        conduit_contracts::FileContextKind,
        conduit_contracts::QueryRequest,
        conduit_contracts::QueryResponse,
        conduit_contracts::Event,
        conduit_contracts::EventType,
        conduit_contracts::Component,
        conduit_contracts::PresetQuery,
        conduit_contracts::CreatePresetQueryRequest,
        conduit_contracts::Workflow,
        conduit_contracts::WorkflowStatus,
        conduit_contracts::ToolDefinition,
        conduit_contracts::ToolClass,
        conduit_contracts::ToolCall,
        conduit_contracts::ToolResult,
        conduit_contracts::ProviderStatus,
        conduit_contracts::ServerSummary,
        conduit_contracts::ServerDetail,
        conduit_contracts::ObsidianEntry,
        conduit_contracts::McpRegistryServer,
        conduit_contracts::McpRegistryServerPage,
        conduit_contracts::McpRegistryToolList,
        query::EventsPage,
        query::SessionStopRequest,
        chat_history::CreateChatSessionRequest,
        chat_history::UpdateSessionRequest,
        presets::UpdatePresetRequest,
        workflow_routes::CreateWorkflowRequest,
        workflow_routes::UpdateWorkflowRequest,
    )),
    tags(
        (name = "query", description = "Session dispatch and event streaming"),
        (name = "chat-history", description = "Session CRUD, replay, and search"),
        (name = "presets", description = "Saved query templates"),
        (name = "workflow", description = "Workflow-mode approval gate state"),
        (name = "tools", description = "Tool plane admin views"),
        (name = "workspace", description = "Obsidian-style workspace browser"),
        (name = "mcp-registry", description = "External MCP server directory"),
    ),
    info(
        title = "Conduit Agent Orchestration Core",
        version = "0.1.0",
        description = "HTTP surface for dispatching conversational agent sessions, streaming their events, and administering the tool plane.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;
