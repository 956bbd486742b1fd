use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::DeploymentImpl;

pub mod generate;
pub mod health;
pub mod preview;
pub mod project;
pub mod site;

pub fn router(deployment: DeploymentImpl) -> Router {
    Router::new()
        .merge(site::router())
        .merge(generate::router(&deployment))
        .merge(project::router(&deployment))
        .merge(health::router())
        .merge(preview::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}
