// Chat history routes (§6): Session CRUD plus event replay/search. These
// are read/management views over rows the Dispatcher already created —
// nothing here drives execution.

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use conduit_contracts::{AgentMode, Event as WireEvent, Session};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat-history/sessions", post(create_session).get(list_sessions))
        .route(
            "/api/chat-history/sessions/:id",
            get(get_session).put(update_session).delete(delete_session),
        )
        .route("/api/chat-history/sessions/:id/events", get(replay_session_events))
        .route("/api/chat-history/events", get(search_events))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateChatSessionRequest {
    pub title: String,
    #[serde(default = "default_agent_mode")]
    pub agent_mode: AgentMode,
}

fn default_agent_mode() -> AgentMode {
    AgentMode::Simple
}

#[utoipa::path(
    post,
    path = "/api/chat-history/sessions",
    request_body = CreateChatSessionRequest,
    responses((status = 200, description = "Session row created", body = Session)),
    tag = "chat-history"
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateChatSessionRequest>,
) -> ApiResult<Json<Session>> {
    let row = state
        .db
        .create_session(conduit_storage::CreateSessionRow {
            session_id: Uuid::now_v7(),
            title: body.title,
            agent_mode: body.agent_mode.to_string(),
            preset_query_id: None,
        })
        .await?;
    Ok(Json(row.into_domain()))
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[utoipa::path(
    get,
    path = "/api/chat-history/sessions",
    params(
        ("limit" = Option<i64>, Query, description = "Max rows (default 50)"),
        ("offset" = Option<i64>, Query, description = "Pagination offset"),
    ),
    responses((status = 200, description = "Sessions, newest first", body = Vec<Session>)),
    tag = "chat-history"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListSessionsParams>,
) -> ApiResult<Json<Vec<Session>>> {
    let rows = state.db.list_sessions(params.limit, params.offset).await?;
    Ok(Json(rows.into_iter().map(|r| r.into_domain()).collect()))
}

#[utoipa::path(
    get,
    path = "/api/chat-history/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session row", body = Session),
        (status = 404, description = "No session with that id"),
    ),
    tag = "chat-history"
)]
pub async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Session>> {
    let row = state
        .db
        .get_session(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no session {id}")))?;
    Ok(Json(row.into_domain()))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateSessionRequest {
    pub title: String,
}

#[utoipa::path(
    put,
    path = "/api/chat-history/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Updated session row", body = Session),
        (status = 404, description = "No session with that id"),
    ),
    tag = "chat-history"
)]
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateSessionRequest>,
) -> ApiResult<Json<Session>> {
    let row = state
        .db
        .update_session_title(id, &body.title)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no session {id}")))?;
    Ok(Json(row.into_domain()))
}

#[utoipa::path(
    delete,
    path = "/api/chat-history/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Session deleted")),
    tag = "chat-history"
)]
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<serde_json::Value>> {
    state.db.delete_session(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct ReplayParams {
    #[serde(default)]
    pub after_id: i64,
    #[serde(default = "default_replay_limit")]
    pub limit: i64,
}

fn default_replay_limit() -> i64 {
    500
}

/// §8 testable property 9: every event visible via poll is also retrievable
/// here, byte-equal in `data`. Row reconstruction must therefore rebuild
/// the exact same `Event` envelope the `EventBus` fanned out, not a
/// lossy projection of it.
#[utoipa::path(
    get,
    path = "/api/chat-history/sessions/{id}/events",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("after_id" = Option<i64>, Query, description = "Cursor to resume from"),
        ("limit" = Option<i64>, Query, description = "Max rows"),
    ),
    responses((status = 200, description = "Replayed events", body = Vec<WireEvent>)),
    tag = "chat-history"
)]
pub async fn replay_session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ReplayParams>,
) -> ApiResult<Json<Vec<WireEvent>>> {
    let rows = state.db.list_events(id, params.after_id, params.limit).await?;
    Ok(Json(rows.into_iter().map(event_row_to_wire).collect()))
}

#[derive(Debug, Deserialize)]
pub struct SearchEventsParams {
    pub session_id: Option<Uuid>,
    pub event_type: Option<String>,
    #[serde(default = "default_replay_limit")]
    pub limit: i64,
}

#[utoipa::path(
    get,
    path = "/api/chat-history/events",
    params(
        ("session_id" = Option<Uuid>, Query, description = "Filter to one session"),
        ("event_type" = Option<String>, Query, description = "Filter to one event type"),
        ("limit" = Option<i64>, Query, description = "Max rows"),
    ),
    responses((status = 200, description = "Matching events, newest first", body = Vec<WireEvent>)),
    tag = "chat-history"
)]
pub async fn search_events(
    State(state): State<AppState>,
    Query(params): Query<SearchEventsParams>,
) -> ApiResult<Json<Vec<WireEvent>>> {
    let rows = state
        .db
        .search_events(params.session_id, params.event_type.as_deref(), params.limit)
        .await?;
    Ok(Json(rows.into_iter().map(event_row_to_wire).collect()))
}

/// The `events` row stores the envelope fields folded into `event_data`
/// (`DbEventEmitter::emit`); this is its exact inverse, so replay is
/// byte-equal to what the observer originally fanned out.
fn event_row_to_wire(row: conduit_storage::EventRow) -> WireEvent {
    let event_type: conduit_contracts::EventType =
        serde_json::from_value(serde_json::Value::String(row.event_type.clone()))
            .unwrap_or(conduit_contracts::EventType::Warning);

    let trace_id = row.event_data["trace_id"].as_str().and_then(|s| s.parse().ok()).unwrap_or(row.session_id);
    let span_id = row.event_data["span_id"].as_str().and_then(|s| s.parse().ok()).unwrap_or_else(Uuid::now_v7);
    let parent_id = row.event_data["parent_id"].as_str().unwrap_or_default().to_string();
    let hierarchy_level = row.event_data["hierarchy_level"].as_i64().unwrap_or(0) as i32;
    let component = serde_json::from_value(row.event_data["component"].clone())
        .unwrap_or(conduit_contracts::Component::System);
    let parent_type = serde_json::from_value(row.event_data["parent_type"].clone()).ok();
    let data = row.event_data["data"].clone();
    let metadata = row.event_data.get("metadata").cloned().filter(|v| !v.is_null());

    WireEvent {
        id: row.id,
        event_type,
        timestamp: row.timestamp,
        trace_id,
        span_id,
        parent_id,
        session_id: row.session_id,
        hierarchy_level,
        component,
        parent_type,
        data,
        metadata,
    }
}
