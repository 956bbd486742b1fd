use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use deployment::Deployment;
use services::services::generation::GenerationError;
use utils::path;

use crate::{DeploymentImpl, error::ApiError};

/// GET /output/{*path}
/// Serves the materialized site. Never cached, the files change on every generation.
pub async fn serve_output(
    State(deployment): State<DeploymentImpl>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = deployment
        .store()
        .output()
        .read_file(&file)
        .await
        .map_err(|e| GenerationError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(file.clone()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type(&file)),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// GET /output/
pub async fn serve_output_root(state: State<DeploymentImpl>) -> Result<Response, ApiError> {
    serve_output(state, Path(String::new())).await
}

/// Paths without an extension resolved to a directory's `index.html`.
fn content_type(file: &str) -> String {
    if path::extension(file).is_none() {
        return "text/html".to_string();
    }
    mime_guess::from_path(file)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/output", get(serve_output_root))
        .route("/output/", get(serve_output_root))
        .route("/output/{*path}", get(serve_output))
}
