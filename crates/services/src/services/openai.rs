//! OpenAI-compatible chat completions provider (OpenAI, OpenRouter).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{
    ai_client::{AiGatewayError, CompletionProvider, http_client, map_reqwest_error, status_error},
    config::AiProvider,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    provider: AiProvider,
    api_key: SecretString,
    model: String,
    endpoint: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(
        provider: AiProvider,
        api_key: SecretString,
        model: String,
        base_url: Option<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, AiGatewayError> {
        let base_url = base_url.unwrap_or_else(|| match provider {
            AiProvider::OpenRouter => OPENROUTER_BASE_URL.to_string(),
            _ => OPENAI_BASE_URL.to_string(),
        });
        Ok(Self {
            http: http_client(timeout)?,
            provider,
            api_key,
            model,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn name(&self) -> &str {
        match self.provider {
            AiProvider::OpenRouter => "openrouter",
            _ => "openai",
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, AiGatewayError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: 0.7,
        };

        let mut builder = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request);
        if self.provider == AiProvider::OpenRouter {
            builder = builder
                .header("HTTP-Referer", "http://localhost")
                .header("X-Title", "Site Generator");
        }

        let res = builder.send().await.map_err(map_reqwest_error)?;
        if !res.status().is_success() {
            return Err(status_error(res).await);
        }

        let response: ChatResponse = res
            .json()
            .await
            .map_err(|e| AiGatewayError::Serde(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(AiGatewayError::EmptyResponse)
    }
}
