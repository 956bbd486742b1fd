use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use db::models::project::{ProjectSnapshot, PromptHistoryEntry};
use deployment::Deployment;
use services::services::archive::ARCHIVE_NAME;
use utils::response::SuccessResponse;

use crate::{DeploymentImpl, error::ApiError};

/// POST /clear-all
pub async fn clear_all(State(deployment): State<DeploymentImpl>) -> Response {
    match deployment.generation().clear_all().await {
        Ok(()) => ResponseJson(SuccessResponse::ok()).into_response(),
        Err(e) => {
            let e = ApiError::from(e);
            tracing::warn!("Clear-all rejected: {}", e);
            (e.status_code(), ResponseJson(SuccessResponse::failed(e.to_string()))).into_response()
        }
    }
}

/// GET /download-zip
pub async fn download_zip(State(deployment): State<DeploymentImpl>) -> Result<Response, ApiError> {
    let bytes = deployment.generation().export_zip().await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{ARCHIVE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/project
pub async fn get_project(State(deployment): State<DeploymentImpl>) -> ResponseJson<ProjectSnapshot> {
    ResponseJson(deployment.generation().snapshot().await)
}

/// GET /api/history
pub async fn get_history(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<Vec<PromptHistoryEntry>> {
    ResponseJson(deployment.store().project().read().await.history().to_vec())
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/clear-all", post(clear_all))
        .route("/api/clear-all", post(clear_all))
        .route("/download-zip", get(download_zip))
        .route("/api/project", get(get_project))
        .route("/api/history", get(get_history))
}
