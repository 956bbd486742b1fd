//! Gateway to the external text-completion model.
//!
//! A provider takes the fully composed instruction text and returns the raw
//! model output. Providers never retry: upstream failures are surfaced as-is
//! so quota exhaustion is visible to the caller.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::warn;

use super::{
    anthropic::AnthropicClient,
    config::{AiConfig, AiProvider},
    gemini::GeminiClient,
    openai::OpenAiClient,
};

#[derive(Debug, Clone, Error)]
pub enum AiGatewayError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("model returned no text")]
    EmptyResponse,
    #[error("missing api key: {var} environment variable not set")]
    MissingApiKey { var: &'static str },
}

/// One opaque text completion call
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, AiGatewayError>;
}

/// Build the provider selected by configuration.
///
/// A missing key does not stop the server; every call reports it instead.
pub fn build_provider(config: &AiConfig) -> Result<Arc<dyn CompletionProvider>, AiGatewayError> {
    let Some(api_key) = config.api_key.as_ref() else {
        warn!(
            provider = %config.provider,
            "{} not set - generation requests will fail",
            config.provider.api_key_var()
        );
        return Ok(Arc::new(MissingKeyProvider {
            var: config.provider.api_key_var(),
        }));
    };

    let provider: Arc<dyn CompletionProvider> = match config.provider {
        AiProvider::Anthropic => Arc::new(AnthropicClient::new(
            SecretString::from(api_key.expose_secret().to_owned()),
            config.model.clone(),
            config.max_tokens,
            config.timeout,
        )?),
        AiProvider::OpenAi | AiProvider::OpenRouter => Arc::new(OpenAiClient::new(
            config.provider,
            SecretString::from(api_key.expose_secret().to_owned()),
            config.model.clone(),
            config.base_url.clone(),
            config.max_tokens,
            config.timeout,
        )?),
        AiProvider::Gemini => Arc::new(GeminiClient::new(
            SecretString::from(api_key.expose_secret().to_owned()),
            config.model.clone(),
            config.max_tokens,
            config.timeout,
        )?),
    };
    Ok(provider)
}

struct MissingKeyProvider {
    var: &'static str,
}

#[async_trait]
impl CompletionProvider for MissingKeyProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, AiGatewayError> {
        Err(AiGatewayError::MissingApiKey { var: self.var })
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, AiGatewayError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("sitegen/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AiGatewayError::Transport(e.to_string()))
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> AiGatewayError {
    if e.is_timeout() {
        AiGatewayError::Timeout
    } else {
        AiGatewayError::Transport(e.to_string())
    }
}

/// Map a non-success status onto the gateway taxonomy.
pub(crate) async fn status_error(res: reqwest::Response) -> AiGatewayError {
    match res.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiGatewayError::InvalidApiKey,
        StatusCode::TOO_MANY_REQUESTS => AiGatewayError::RateLimited,
        s => {
            let status = s.as_u16();
            let body = res.text().await.unwrap_or_default();
            AiGatewayError::Http { status, body }
        }
    }
}
