use async_trait::async_trait;
use db::{ProjectStore, StoreError};
use services::services::{
    ai_client::AiGatewayError,
    config::{Config, ConfigError},
    generation::GenerationService,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gateway(#[from] AiGatewayError),
}

/// Everything a route handler can reach: configuration, the project store and
/// the generation pipeline that owns it.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn generation(&self) -> &GenerationService;

    fn store(&self) -> &ProjectStore {
        self.generation().store()
    }
}
