// Tools admin routes (§6 "Tools admin"): read-only views over the tool
// plane. `GET /api/tools` is a cheap, already-computed listing (the
// `ToolRegistry` is built once at startup and held in `AppState`, so this
// never touches the network); `GET /api/tools/detail` additionally
// consults the `DiscoveryCache` for prompt/resource names, which is itself
// cached on first discovery (§4.3).

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use conduit_contracts::{ProviderStatus, ServerDetail, ServerSummary};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const CORE_SERVER_NAME: &str = "core";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tools", get(list_tools))
        .route("/api/tools/detail", get(tool_detail))
}

/// `GET /api/tools` (§6 "servers sorted alphabetically"). Custom/virtual
/// tools (no `provider_name`) are grouped under a synthetic `"core"`
/// server rather than omitted, so the listing accounts for every tool the
/// registry holds.
#[utoipa::path(
    get,
    path = "/api/tools",
    responses((status = 200, description = "Servers, alphabetical by name", body = Vec<ServerSummary>)),
    tag = "tools"
)]
pub async fn list_tools(State(state): State<AppState>) -> ApiResult<Json<Vec<ServerSummary>>> {
    let mut by_server: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for def in state.registry.tool_definitions() {
        let server = def.provider_name.clone().unwrap_or_else(|| CORE_SERVER_NAME.to_string());
        by_server.entry(server).or_default().push(def.name);
    }

    let mut summaries: Vec<ServerSummary> = by_server
        .into_iter()
        .map(|(name, mut function_names)| {
            function_names.sort();
            ServerSummary {
                status: ProviderStatus::Healthy,
                tool_count: function_names.len(),
                name,
                function_names,
            }
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(summaries))
}

#[derive(Debug, Deserialize)]
pub struct ToolDetailParams {
    pub server_name: String,
}

/// `GET /api/tools/detail?server_name=` (§6 "on-demand detailed schema per
/// provider; caches on first call" — the cache referred to is the
/// `DiscoveryCache` this reads from, already populated at discovery time).
#[utoipa::path(
    get,
    path = "/api/tools/detail",
    params(("server_name" = String, Query, description = "Server/provider name from GET /api/tools")),
    responses(
        (status = 200, description = "Full tool/prompt/resource listing for one server", body = ServerDetail),
        (status = 404, description = "No server with that name"),
    ),
    tag = "tools"
)]
pub async fn tool_detail(
    State(state): State<AppState>,
    Query(params): Query<ToolDetailParams>,
) -> ApiResult<Json<ServerDetail>> {
    let tools: Vec<_> = state
        .registry
        .tool_definitions()
        .into_iter()
        .filter(|def| {
            def.provider_name.as_deref().unwrap_or(CORE_SERVER_NAME) == params.server_name
        })
        .collect();

    if tools.is_empty() && params.server_name != CORE_SERVER_NAME {
        return Err(ApiError::NotFound(format!("no server named {}", params.server_name)));
    }

    let entry = state.discovery.get_entry(&params.server_name).await;
    let (prompt_names, resource_names) = match &entry {
        Some(entry) => (
            entry.prompts.iter().map(|p| p.name.clone()).collect(),
            entry.resources.iter().map(|r| r.name.clone()).collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    Ok(Json(ServerDetail {
        name: params.server_name,
        status: ProviderStatus::Healthy,
        tools,
        prompt_names,
        resource_names,
    }))
}
