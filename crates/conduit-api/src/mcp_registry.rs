// MCP registry proxy (§6 "MCP registry"): a thin, cached pass-through to an
// external directory of installable MCP servers. Distinct from
// `conduit_tools::DiscoveryCache`, which caches *configured* providers'
// tool inventories — this caches *catalog* listings of servers an operator
// hasn't added yet, so it gets its own small TTL cache local to this module
// rather than overloading `DiscoveryCache`'s provider-keyed shape (recorded
// in DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use conduit_contracts::{McpRegistryServer, McpRegistryServerPage, McpRegistryToolList};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_REGISTRY_BASE_URL: &str = "https://registry.modelcontextprotocol.io/v0";
const CACHE_TTL: Duration = Duration::from_secs(300);

struct CacheSlot {
    fetched_at: Instant,
    body: serde_json::Value,
}

#[derive(Clone)]
pub struct McpRegistryState {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<RwLock<HashMap<String, CacheSlot>>>,
}

impl McpRegistryState {
    pub fn new() -> Self {
        let base_url = std::env::var("CONDUIT_MCP_REGISTRY_URL")
            .unwrap_or_else(|_| DEFAULT_REGISTRY_BASE_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            base_url,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns `(body, was_cache_hit)`, fetching and caching on miss.
    async fn get_cached(&self, cache_key: &str, path: &str) -> ApiResult<(serde_json::Value, bool)> {
        if let Some(slot) = self.cache.read().await.get(cache_key) {
            if slot.fetched_at.elapsed() < CACHE_TTL {
                return Ok((slot.body.clone(), true));
            }
        }

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::BadRequest(format!("mcp registry request failed: {e}")))?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::BadRequest(format!("mcp registry returned invalid json: {e}")))?;

        self.cache.write().await.insert(
            cache_key.to_string(),
            CacheSlot { fetched_at: Instant::now(), body: body.clone() },
        );
        Ok((body, false))
    }
}

impl Default for McpRegistryState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn routes(state: McpRegistryState) -> Router<AppState> {
    let scoped: Router<McpRegistryState> = Router::new()
        .route("/api/mcp-registry/servers", get(list_servers))
        .route("/api/mcp-registry/servers/:id", get(get_server))
        .route("/api/mcp-registry/servers/:id/tools", get(server_tools));
    Router::new().merge(scoped.with_state(state))
}

#[derive(Debug, Deserialize)]
pub struct ListServersParams {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub cursor: String,
}

/// `GET /api/mcp-registry/servers?search=&cursor=` (§6 "cursor pagination;
/// when the returned cursor equals the request cursor, treat as
/// end-of-list").
#[utoipa::path(
    get,
    path = "/api/mcp-registry/servers",
    params(
        ("search" = Option<String>, Query, description = "Free-text filter"),
        ("cursor" = Option<String>, Query, description = "Pagination cursor"),
    ),
    responses((status = 200, description = "Page of registry servers", body = McpRegistryServerPage)),
    tag = "mcp-registry"
)]
pub async fn list_servers(
    State(state): State<McpRegistryState>,
    Query(params): Query<ListServersParams>,
) -> impl IntoResponse {
    let cache_key = format!("servers:{}:{}", params.search, params.cursor);
    let path = format!("/servers?search={}&cursor={}", params.search, params.cursor);

    match state.get_cached(&cache_key, &path).await {
        Ok((body, hit)) => {
            let page: McpRegistryServerPage = serde_json::from_value(body).unwrap_or(McpRegistryServerPage {
                servers: Vec::new(),
                next_cursor: params.cursor,
            });
            with_cache_header(Json(page), hit).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// `GET /api/mcp-registry/servers/{id}`.
#[utoipa::path(
    get,
    path = "/api/mcp-registry/servers/{id}",
    params(("id" = String, Path, description = "Registry server id")),
    responses((status = 200, description = "Registry server detail", body = McpRegistryServer)),
    tag = "mcp-registry"
)]
pub async fn get_server(State(state): State<McpRegistryState>, Path(id): Path<String>) -> impl IntoResponse {
    let cache_key = format!("server:{id}");
    let path = format!("/servers/{id}");

    match state.get_cached(&cache_key, &path).await {
        Ok((body, hit)) => match serde_json::from_value::<McpRegistryServer>(body) {
            Ok(server) => with_cache_header(Json(server), hit).into_response(),
            Err(e) => ApiError::BadRequest(format!("malformed registry server body: {e}")).into_response(),
        },
        Err(err) => err.into_response(),
    }
}

/// `GET /api/mcp-registry/servers/{id}/tools`, with `X-Cache-Status:
/// HIT|MISS` set from whichever cache lookup answered the request.
#[utoipa::path(
    get,
    path = "/api/mcp-registry/servers/{id}/tools",
    params(("id" = String, Path, description = "Registry server id")),
    responses((status = 200, description = "Tools advertised by that registry server", body = McpRegistryToolList)),
    tag = "mcp-registry"
)]
pub async fn server_tools(State(state): State<McpRegistryState>, Path(id): Path<String>) -> impl IntoResponse {
    let cache_key = format!("tools:{id}");
    let path = format!("/servers/{id}/tools");

    match state.get_cached(&cache_key, &path).await {
        Ok((body, hit)) => match serde_json::from_value::<McpRegistryToolList>(body) {
            Ok(list) => with_cache_header(Json(list), hit).into_response(),
            Err(e) => ApiError::BadRequest(format!("malformed registry tools body: {e}")).into_response(),
        },
        Err(err) => err.into_response(),
    }
}

fn with_cache_header<T: IntoResponse>(body: T, hit: bool) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Cache-Status",
        HeaderValue::from_static(if hit { "HIT" } else { "MISS" }),
    );
    (headers, body)
}
