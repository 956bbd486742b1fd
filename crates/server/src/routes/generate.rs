use axum::{
    Form, Router,
    extract::{State, rejection::FormRejection},
    response::Json as ResponseJson,
    routing::post,
};
use db::models::project::PromptKind;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::generation::{GenerationError, GenerationOutcome};
use ts_rs::TS;

use crate::{DeploymentImpl, error::ApiError};

/// Urlencoded body of `/generate` and `/refine`
#[derive(Debug, Deserialize)]
pub struct PromptForm {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct GenerateResponse {
    /// Embedded preview, versioned so the iframe reloads after a refinement
    pub preview_url: String,
    pub new_tab_url: String,
    pub files_generated: Vec<String>,
    pub message: String,
}

impl GenerateResponse {
    fn from_outcome(outcome: GenerationOutcome) -> Result<Self, ApiError> {
        let main = outcome.main_html.ok_or_else(|| {
            GenerationError::Internal("Could not determine the main file for preview.".to_string())
        })?;

        let action = match outcome.mode {
            PromptKind::Initial => "generated",
            PromptKind::Refinement => "refined",
        };
        let message = if outcome.attempts > 1 {
            format!(
                "Website {action} successfully ({} files, {} attempts)",
                outcome.files.len(),
                outcome.attempts
            )
        } else {
            format!("Website {action} successfully ({} files)", outcome.files.len())
        };

        Ok(Self {
            preview_url: format!("/output/{main}?v={}", outcome.generation),
            new_tab_url: format!("/output/{main}"),
            files_generated: outcome.files,
            message,
        })
    }
}

/// POST /generate
/// Creates a site, or refines the current one when files already exist
pub async fn generate(
    State(deployment): State<DeploymentImpl>,
    form: Result<Form<PromptForm>, FormRejection>,
) -> Result<ResponseJson<GenerateResponse>, ApiError> {
    let Form(form) = form?;
    let outcome = deployment.generation().generate(&form.prompt).await?;
    Ok(ResponseJson(GenerateResponse::from_outcome(outcome)?))
}

/// POST /refine
pub async fn refine(
    State(deployment): State<DeploymentImpl>,
    form: Result<Form<PromptForm>, FormRejection>,
) -> Result<ResponseJson<GenerateResponse>, ApiError> {
    let Form(form) = form?;
    let outcome = deployment.generation().refine(&form.prompt).await?;
    Ok(ResponseJson(GenerateResponse::from_outcome(outcome)?))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/generate", post(generate))
        .route("/refine", post(refine))
}
