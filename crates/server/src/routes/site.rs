use axum::{
    Router,
    extract::Path,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use rust_embed::RustEmbed;

use crate::{DeploymentImpl, error::ApiError};

/// Landing page assets compiled into the binary
#[derive(RustEmbed)]
#[folder = "../../site"]
struct SiteAssets;

fn serve_asset(file: &str) -> Result<Response, ApiError> {
    let asset = SiteAssets::get(file).ok_or_else(|| ApiError::NotFound(file.to_string()))?;
    let mime = mime_guess::from_path(file).first_or_octet_stream();

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.essence_str().to_string())],
        asset.data.into_owned(),
    )
        .into_response())
}

/// GET /
pub async fn index() -> Result<Response, ApiError> {
    serve_asset("index.html")
}

/// GET /site/{*path}
pub async fn site_file(Path(file): Path<String>) -> Result<Response, ApiError> {
    serve_asset(&file)
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/", get(index))
        .route("/site/{*path}", get(site_file))
}
