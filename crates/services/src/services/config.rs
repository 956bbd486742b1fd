//! Runtime configuration read from environment variables.

use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use secrecy::SecretString;
use strum_macros::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which text-completion API the generator talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AiProvider {
    #[strum(to_string = "anthropic", serialize = "claude")]
    Anthropic,
    OpenAi,
    OpenRouter,
    #[strum(to_string = "gemini", serialize = "google")]
    Gemini,
}

impl AiProvider {
    /// Key lookup order when `AI_PROVIDER` is not set
    const AUTODETECT: [AiProvider; 4] = [
        AiProvider::Anthropic,
        AiProvider::OpenAi,
        AiProvider::OpenRouter,
        AiProvider::Gemini,
    ];

    pub fn api_key_var(&self) -> &'static str {
        match self {
            AiProvider::Anthropic => "ANTHROPIC_API_KEY",
            AiProvider::OpenAi => "OPENAI_API_KEY",
            AiProvider::OpenRouter => "OPENROUTER_API_KEY",
            AiProvider::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::Anthropic => "claude-sonnet-4-20250514",
            AiProvider::OpenAi => "gpt-4o",
            AiProvider::OpenRouter => "openai/gpt-4o",
            AiProvider::Gemini => "gemini-1.5-flash-latest",
        }
    }

    fn base_url_var(&self) -> Option<&'static str> {
        match self {
            AiProvider::OpenAi => Some("OPENAI_API_BASE_URL"),
            AiProvider::OpenRouter => Some("OPENROUTER_API_BASE_URL"),
            AiProvider::Anthropic | AiProvider::Gemini => None,
        }
    }

    fn model_var(&self) -> Option<&'static str> {
        match self {
            AiProvider::OpenRouter => Some("OPENROUTER_MODEL"),
            AiProvider::Gemini => Some("GEMINI_MODEL"),
            AiProvider::Anthropic | AiProvider::OpenAi => None,
        }
    }
}

/// What happens to the history entry of a generation that failed for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailedAttemptPolicy {
    /// Failed prompts are dropped so refinement context only sees working requests
    #[default]
    Discard,
    Record,
}

#[derive(Debug)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Attempts per request, the first one included
    pub max_attempts: u32,
    pub max_prompt_chars: usize,
    pub failed_attempt_policy: FailedAttemptPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_prompt_chars: 200_000,
            failed_attempt_policy: FailedAttemptPolicy::Discard,
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub output_dir: PathBuf,
    pub restore_output_on_startup: bool,
    pub ai: AiConfig,
    pub generation: GenerationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = match get("AI_PROVIDER") {
            Some(raw) => AiProvider::from_str(&raw).map_err(|_| ConfigError::Invalid {
                var: "AI_PROVIDER",
                value: raw.clone(),
                reason: "expected anthropic, openai, openrouter or gemini".to_string(),
            })?,
            None => AiProvider::AUTODETECT
                .into_iter()
                .find(|p| get(p.api_key_var()).is_some())
                .unwrap_or(AiProvider::Anthropic),
        };

        let api_key = get("AI_API_KEY")
            .or_else(|| get(provider.api_key_var()))
            .map(SecretString::from);
        let model = get("AI_MODEL")
            .or_else(|| provider.model_var().and_then(|var| get(var)))
            .unwrap_or_else(|| provider.default_model().to_string());
        let base_url = provider
            .base_url_var()
            .and_then(|var| get(var))
            .map(|url| normalize_base_url(&url));

        let generation = GenerationConfig {
            max_attempts: parse_var(&get, "GENERATION_MAX_ATTEMPTS", 3u32)?,
            max_prompt_chars: parse_var(&get, "MAX_PROMPT_CHARS", 200_000usize)?,
            failed_attempt_policy: if parse_bool(&get, "RECORD_FAILED_ATTEMPTS", false)? {
                FailedAttemptPolicy::Record
            } else {
                FailedAttemptPolicy::Discard
            },
        };
        if generation.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "GENERATION_MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(&get, "PORT", 5001u16)?,
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
            restore_output_on_startup: parse_bool(&get, "RESTORE_OUTPUT_ON_STARTUP", true)?,
            ai: AiConfig {
                provider,
                model,
                api_key,
                base_url,
                max_tokens: parse_var(&get, "AI_MAX_TOKENS", 8192u32)?,
                timeout: Duration::from_secs(parse_var(&get, "AI_TIMEOUT_SECS", 120u64)?),
            },
            generation,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Users paste full endpoint URLs; keep only the API root.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    url.strip_suffix("/chat/completions")
        .unwrap_or(url)
        .trim_end_matches('/')
        .to_string()
}

fn parse_var<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var,
                value: raw,
                reason: "expected true or false".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:5001");
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.ai.provider, AiProvider::Anthropic);
        assert!(config.ai.api_key.is_none());
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(
            config.generation.failed_attempt_policy,
            FailedAttemptPolicy::Discard
        );
        assert!(config.restore_output_on_startup);
    }

    #[test]
    fn test_provider_autodetected_from_key() {
        let config = config(&[("GEMINI_API_KEY", "g-key")]).unwrap();
        assert_eq!(config.ai.provider, AiProvider::Gemini);
        assert_eq!(config.ai.model, "gemini-1.5-flash-latest");
        assert_eq!(config.ai.api_key.unwrap().expose_secret(), "g-key");
    }

    #[test]
    fn test_openrouter_settings() {
        let config = config(&[
            ("AI_PROVIDER", "OpenRouter"),
            ("OPENROUTER_API_KEY", "or-key"),
            ("OPENROUTER_MODEL", "anthropic/claude-3.5-sonnet"),
            ("OPENROUTER_API_BASE_URL", "https://openrouter.ai/api/v1/chat/completions"),
        ])
        .unwrap();
        assert_eq!(config.ai.provider, AiProvider::OpenRouter);
        assert_eq!(config.ai.model, "anthropic/claude-3.5-sonnet");
        assert_eq!(config.ai.base_url.as_deref(), Some("https://openrouter.ai/api/v1"));
    }

    #[test]
    fn test_provider_aliases() {
        assert_eq!(AiProvider::from_str("claude").unwrap(), AiProvider::Anthropic);
        assert_eq!(AiProvider::from_str("OPENAI").unwrap(), AiProvider::OpenAi);
        assert_eq!(AiProvider::Anthropic.to_string(), "anthropic");
        assert_eq!(AiProvider::OpenRouter.to_string(), "openrouter");
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = config(&[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));

        let err = config(&[("GENERATION_MAX_ATTEMPTS", "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "GENERATION_MAX_ATTEMPTS",
                ..
            }
        ));

        let err = config(&[("RECORD_FAILED_ATTEMPTS", "maybe")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "RECORD_FAILED_ATTEMPTS",
                ..
            }
        ));
    }

    #[test]
    fn test_record_failed_attempts() {
        let config = config(&[("RECORD_FAILED_ATTEMPTS", "yes")]).unwrap();
        assert_eq!(
            config.generation.failed_attempt_policy,
            FailedAttemptPolicy::Record
        );
    }
}
