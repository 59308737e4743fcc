// HTTP error mapping (§7 error taxonomy). Every route returns `ApiResult<T>`;
// `CoreError::kind()` already gives a stable string, so the JSON body reuses
// it rather than re-deriving one from the HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use conduit_core::error::CoreError;
use serde::Serialize;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Storage(#[from] conduit_storage::StorageError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
}

impl From<conduit_orchestrator::OrchestratorError> for ApiError {
    fn from(err: conduit_orchestrator::OrchestratorError) -> Self {
        ApiError::Core(CoreError::from(err))
    }
}

impl From<conduit_tools::ToolsError> for ApiError {
    fn from(err: conduit_tools::ToolsError) -> Self {
        ApiError::Core(CoreError::from(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::Core(err) => (status_for_core_error(err), err.kind()),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_input"),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn status_for_core_error(err: &CoreError) -> StatusCode {
    match err {
        CoreError::BadInput(_) => StatusCode::BAD_REQUEST,
        CoreError::ToolNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Cancelled => StatusCode::CONFLICT,
        CoreError::ProviderDiscoveryFailed(_)
        | CoreError::ProviderUnavailable(_)
        | CoreError::ToolExecutionFailed(_)
        | CoreError::LlmTransient(_)
        | CoreError::LlmPermanent(_)
        | CoreError::ValidationLogicFailure(_)
        | CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
