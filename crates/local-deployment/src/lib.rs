use std::sync::Arc;

use async_trait::async_trait;
use db::ProjectStore;
use deployment::{Deployment, DeploymentError};
use services::services::{
    ai_client::{CompletionProvider, build_provider},
    config::Config,
    generation::GenerationService,
};
use tracing::info;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    generation: GenerationService,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::from_env()?;
        let provider = build_provider(&config.ai)?;
        Self::with_provider(config, provider).await
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn generation(&self) -> &GenerationService {
        &self.generation
    }
}

impl LocalDeployment {
    /// Assemble a deployment around an already built provider.
    pub async fn with_provider(
        config: Config,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self, DeploymentError> {
        let store =
            ProjectStore::open(config.output_dir.clone(), config.restore_output_on_startup).await?;

        info!(
            provider = provider.name(),
            model = %config.ai.model,
            output_dir = %config.output_dir.display(),
            "Deployment initialized"
        );

        let generation = GenerationService::new(provider, store, config.generation.clone());
        Ok(Self {
            config: Arc::new(config),
            generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use db::models::project::GenerationStatus;
    use services::services::generation::GenerationError;

    use super::*;

    fn config_for(output_dir: &std::path::Path, restore: bool) -> Config {
        let output_dir = output_dir.display().to_string();
        Config::from_lookup(|key| match key {
            "OUTPUT_DIR" => Some(output_dir.clone()),
            "RESTORE_OUTPUT_ON_STARTUP" => Some(restore.to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_restores_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(output.join("index.html"), "<h1>Old</h1>").unwrap();

        let config = config_for(&output, true);
        let provider = build_provider(&config.ai).unwrap();
        let deployment = LocalDeployment::with_provider(config, provider).await.unwrap();

        let snapshot = deployment.generation().snapshot().await;
        assert_eq!(snapshot.status, GenerationStatus::Ready);
        assert_eq!(snapshot.files, vec!["index.html".to_string()]);
        assert!(deployment.store().project().read().await.has_files());
    }

    #[tokio::test]
    async fn test_missing_key_fails_generation_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir.path().join("output"), false);
        assert!(config.ai.api_key.is_none());

        let provider = build_provider(&config.ai).unwrap();
        let deployment = LocalDeployment::with_provider(config, provider).await.unwrap();

        let err = deployment
            .generation()
            .generate("portfolio site")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
        assert_eq!(
            deployment.generation().snapshot().await.status,
            GenerationStatus::Failed
        );
    }
}
