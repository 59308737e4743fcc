// `POST /api/query`, `GET /api/events`, `POST /api/session/stop` (§6) — the
// three routes that carry the Dispatcher's entire HTTP contract. One
// `AppState`-scoped router function per resource, `#[utoipa::path]` on
// every handler.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use conduit_contracts::session::{QueryRequest, QueryResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatcher::{ActiveSessions, Dispatcher};
use crate::error::{ApiError, ApiResult};
use crate::observer::{ObserverManager, DEFAULT_POLL_BATCH_SIZE};
use crate::state::AppState;

/// Long-poll wait ceiling for `GET /api/events` (§9 Open Question: "exact
/// batch size and poll interval... should expose them as configuration").
/// Kept as a constant here rather than a config knob since this binary has
/// no running config-reload path; revisit if that changes.
const POLL_WAIT: Duration = Duration::from_secs(25);

#[derive(Clone)]
pub struct QueryState {
    pub dispatcher: Arc<Dispatcher>,
    pub observers: Arc<ObserverManager>,
    pub active: Arc<ActiveSessions>,
}

pub fn routes(state: QueryState) -> Router<AppState> {
    let scoped: Router<QueryState> = Router::new()
        .route("/api/query", post(post_query))
        .route("/api/events", get(get_events))
        .route("/api/session/stop", post(post_session_stop));
    Router::new().merge(scoped.with_state(state))
}

#[utoipa::path(
    post,
    path = "/api/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Session and observer created; execution continues in background", body = QueryResponse),
        (status = 400, description = "Validation error (bad mode, missing Tasks/ folder)"),
    ),
    tag = "query"
)]
pub async fn post_query(
    State(state): State<QueryState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let (session_id, observer_id) = state.dispatcher.dispatch(request).await?;
    Ok(Json(QueryResponse { session_id, observer_id }))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub observer_id: Uuid,
    #[serde(default)]
    pub cursor: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EventsPage {
    pub events: Vec<conduit_contracts::Event>,
    pub next_cursor: usize,
    pub completed: bool,
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(
        ("observer_id" = Uuid, Query, description = "Observer id returned by POST /api/query"),
        ("cursor" = Option<usize>, Query, description = "Last cursor observed by the client"),
    ),
    responses(
        (status = 200, description = "Events past cursor, the next cursor, and whether the stream is done", body = EventsPage),
        (status = 404, description = "No observer with that id"),
    ),
    tag = "query"
)]
pub async fn get_events(
    State(state): State<QueryState>,
    Query(params): Query<EventsQuery>,
) -> ApiResult<Json<EventsPage>> {
    let observer = state
        .observers
        .get(params.observer_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no observer {}", params.observer_id)))?;

    observer.wait_for_events(params.cursor, POLL_WAIT).await;
    let (events, next_cursor, completed) = observer.poll(params.cursor, DEFAULT_POLL_BATCH_SIZE).await;
    Ok(Json(EventsPage { events, next_cursor, completed }))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SessionStopRequest {
    pub session_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/session/stop",
    request_body = SessionStopRequest,
    responses(
        (status = 200, description = "Cancellation requested"),
        (status = 404, description = "No active session with that id"),
    ),
    tag = "query"
)]
pub async fn post_session_stop(
    State(state): State<QueryState>,
    Json(body): Json<SessionStopRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if state.active.cancel(body.session_id).await {
        Ok(Json(serde_json::json!({ "stopped": true })))
    } else {
        Err(ApiError::NotFound(format!("no active session {}", body.session_id)))
    }
}
