use axum::{
    Json,
    extract::rejection::FormRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::generation::GenerationError;
use thiserror::Error;
use utils::response::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request body: {}", .0.body_text())]
    InvalidForm(#[from] FormRejection),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidForm(rejection) => rejection.status(),
            ApiError::Generation(e) => match e {
                GenerationError::EmptyPrompt => StatusCode::BAD_REQUEST,
                GenerationError::PromptTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                GenerationError::UpstreamRateLimited => StatusCode::TOO_MANY_REQUESTS,
                GenerationError::UpstreamUnavailable(_)
                | GenerationError::MalformedResponse
                | GenerationError::IncompleteGeneration { .. } => StatusCode::BAD_GATEWAY,
                GenerationError::AlreadyGenerating | GenerationError::NothingToRefine => {
                    StatusCode::CONFLICT
                }
                GenerationError::NothingToExport => StatusCode::NOT_FOUND,
                GenerationError::DiskWriteError(_)
                | GenerationError::Configuration(_)
                | GenerationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected: {}", self);
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
