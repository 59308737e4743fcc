// Preset query routes (§6 "Presets"): saved query templates an operator can
// launch without retyping. Seeded (`is_predefined`) rows are read-only —
// `delete_preset_query` already guards that at the SQL layer.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use conduit_contracts::preset::{CreatePresetQueryRequest, PresetQuery};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/presets", post(create_preset).get(list_presets))
        .route(
            "/api/presets/:id",
            get(get_preset).put(update_preset).delete(delete_preset),
        )
}

#[utoipa::path(
    post,
    path = "/api/presets",
    request_body = CreatePresetQueryRequest,
    responses((status = 200, description = "Preset created", body = PresetQuery)),
    tag = "presets"
)]
pub async fn create_preset(
    State(state): State<AppState>,
    Json(body): Json<CreatePresetQueryRequest>,
) -> ApiResult<Json<PresetQuery>> {
    let row = state
        .db
        .create_preset_query(conduit_storage::CreatePresetQueryRow {
            preset_query_id: Uuid::now_v7(),
            label: body.name,
            query: body.query,
            agent_mode: body.agent_mode.to_string(),
            selected_servers: serde_json::to_value(&body.selected_servers).unwrap_or_default(),
            is_predefined: false,
        })
        .await?;
    Ok(Json(row.into_domain()))
}

#[utoipa::path(
    get,
    path = "/api/presets",
    responses((status = 200, description = "All presets, predefined first", body = Vec<PresetQuery>)),
    tag = "presets"
)]
pub async fn list_presets(State(state): State<AppState>) -> ApiResult<Json<Vec<PresetQuery>>> {
    let rows = state.db.list_preset_queries().await?;
    Ok(Json(rows.into_iter().map(|r| r.into_domain()).collect()))
}

#[utoipa::path(
    get,
    path = "/api/presets/{id}",
    params(("id" = Uuid, Path, description = "Preset id")),
    responses(
        (status = 200, description = "Preset row", body = PresetQuery),
        (status = 404, description = "No preset with that id"),
    ),
    tag = "presets"
)]
pub async fn get_preset(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<PresetQuery>> {
    let row = state
        .db
        .get_preset_query(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no preset {id}")))?;
    Ok(Json(row.into_domain()))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdatePresetRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub selected_servers: Option<Vec<String>>,
}

#[utoipa::path(
    put,
    path = "/api/presets/{id}",
    params(("id" = Uuid, Path, description = "Preset id")),
    request_body = UpdatePresetRequest,
    responses(
        (status = 200, description = "Updated preset row", body = PresetQuery),
        (status = 404, description = "No preset with that id"),
    ),
    tag = "presets"
)]
pub async fn update_preset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePresetRequest>,
) -> ApiResult<Json<PresetQuery>> {
    let row = state
        .db
        .update_preset_query(
            id,
            body.name,
            body.query,
            body.selected_servers
                .map(|servers| serde_json::to_value(servers).unwrap_or_default()),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no preset {id}")))?;
    Ok(Json(row.into_domain()))
}

#[utoipa::path(
    delete,
    path = "/api/presets/{id}",
    params(("id" = Uuid, Path, description = "Preset id")),
    responses((status = 200, description = "Preset deleted (no-op on predefined presets)")),
    tag = "presets"
)]
pub async fn delete_preset(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<serde_json::Value>> {
    state.db.delete_preset_query(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
