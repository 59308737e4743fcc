// Workflow admin routes (§4.7, §6 "Workflow"). These mutate `workflow_status`
// / `objective` only — they never execute anything themselves. Execution
// happens later when the next `POST /api/query` arrives and the Dispatcher
// reads the current state (§6 "Workflow UI buttons never execute").

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use conduit_contracts::workflow::{Workflow, WorkflowStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflow/create", post(create_workflow))
        .route("/api/workflow/status", get(get_workflow_status))
        .route("/api/workflow/update", post(update_workflow))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateWorkflowRequest {
    pub session_id: Uuid,
    pub objective: String,
    #[serde(default)]
    pub preset_query_id: Option<Uuid>,
    #[serde(default = "default_todo_path")]
    pub todo_file_path: String,
}

fn default_todo_path() -> String {
    "todo.md".to_string()
}

/// `POST /api/workflow/create` (§6 "create only — no execution").
#[utoipa::path(
    post,
    path = "/api/workflow/create",
    request_body = CreateWorkflowRequest,
    responses((status = 200, description = "Workflow row created in pre_verification", body = Workflow)),
    tag = "workflow"
)]
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkflowRequest>,
) -> ApiResult<Json<Workflow>> {
    let row = state
        .db
        .create_workflow(conduit_storage::CreateWorkflowRow {
            workflow_id: Uuid::now_v7(),
            session_id: body.session_id,
            preset_query_id: body.preset_query_id,
            objective: body.objective,
            todo_file_path: body.todo_file_path,
        })
        .await?;
    Ok(Json(row.into_domain()))
}

#[derive(Debug, Deserialize)]
pub struct WorkflowStatusParams {
    pub session_id: Uuid,
}

/// `GET /api/workflow/status` (§6 "read state").
#[utoipa::path(
    get,
    path = "/api/workflow/status",
    params(("session_id" = Uuid, Query, description = "Session the workflow belongs to")),
    responses(
        (status = 200, description = "Current workflow row", body = Workflow),
        (status = 404, description = "No workflow for that session"),
    ),
    tag = "workflow"
)]
pub async fn get_workflow_status(
    State(state): State<AppState>,
    Query(params): Query<WorkflowStatusParams>,
) -> ApiResult<Json<Workflow>> {
    let row = state
        .db
        .get_workflow_by_session(params.session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no workflow for session {}", params.session_id)))?;
    Ok(Json(row.into_domain()))
}

/// One unified request body for every UI button (§6 "single endpoint that
/// updates either `workflow_status` or `objective`"). Exactly one of
/// `status`/`objective` is expected per call; sending both is accepted and
/// applies both, since the column writes are independent statements.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateWorkflowRequest {
    pub workflow_id: Uuid,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub objective: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/workflow/update",
    request_body = UpdateWorkflowRequest,
    responses(
        (status = 200, description = "Updated workflow row", body = Workflow),
        (status = 400, description = "Neither status nor objective supplied"),
        (status = 404, description = "No workflow with that id"),
    ),
    tag = "workflow"
)]
pub async fn update_workflow(
    State(state): State<AppState>,
    Json(body): Json<UpdateWorkflowRequest>,
) -> ApiResult<Json<Workflow>> {
    if body.status.is_none() && body.objective.is_none() {
        return Err(ApiError::BadRequest(
            "update requires at least one of status/objective".into(),
        ));
    }

    let mut row = None;
    if let Some(status) = body.status {
        row = state
            .db
            .update_workflow_status(body.workflow_id, &status.to_string())
            .await?;
    }
    if let Some(objective) = body.objective {
        row = state.db.update_objective(body.workflow_id, &objective).await?;
    }

    let row = row.ok_or_else(|| ApiError::NotFound(format!("no workflow {}", body.workflow_id)))?;
    Ok(Json(row.into_domain()))
}
