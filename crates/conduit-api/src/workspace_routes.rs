// Workspace / Obsidian-style file browser (§6 "Workspace"). Read-only
// directory listing rooted at `AppState::workspace_root`; the actual file
// read/write/patch operations are virtual tools the LLM invokes
// (conduit_tools::virtual_tools), not HTTP routes.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use conduit_contracts::ObsidianEntry;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/obsidian/files", get(list_root))
        .route("/api/obsidian/folder/*path", get(list_folder))
}

#[utoipa::path(
    get,
    path = "/api/obsidian/files",
    responses((status = 200, description = "Top-level workspace entries", body = Vec<ObsidianEntry>)),
    tag = "workspace"
)]
pub async fn list_root(State(state): State<AppState>) -> ApiResult<Json<Vec<ObsidianEntry>>> {
    let entries = read_dir_entries(&state.workspace_root, "").await?;
    Ok(Json(entries))
}

#[utoipa::path(
    get,
    path = "/api/obsidian/folder/{path}/children",
    params(("path" = String, axum::extract::Path, description = "Folder path relative to the workspace root")),
    responses(
        (status = 200, description = "Entries directly under the given folder", body = Vec<ObsidianEntry>),
        (status = 404, description = "No such folder"),
    ),
    tag = "workspace"
)]
pub async fn list_folder(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> ApiResult<Json<Vec<ObsidianEntry>>> {
    let relative = path.strip_suffix("/children").unwrap_or(&path);
    let target = safe_join(&state.workspace_root, relative)?;
    let entries = read_dir_entries(&target, relative).await?;
    Ok(Json(entries))
}

/// Rejects any relative path that would escape the workspace root via `..`
/// segments — this browser is read-only but still shouldn't follow a
/// crafted path outside the session's own directory.
fn safe_join(root: &std::path::Path, relative: &str) -> ApiResult<std::path::PathBuf> {
    if relative.split('/').any(|segment| segment == "..") {
        return Err(ApiError::BadRequest("path must not contain '..'".into()));
    }
    Ok(root.join(relative.trim_start_matches('/')))
}

async fn read_dir_entries(dir: &std::path::Path, prefix: &str) -> ApiResult<Vec<ObsidianEntry>> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(_) => return Ok(Vec::new()),
    };

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_folder = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        entries.push(ObsidianEntry { name, path, is_folder });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
