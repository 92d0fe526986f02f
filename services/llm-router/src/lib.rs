use std::sync::Arc;
use std::time::Duration;

use ai_agent::LanguageModelClient;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod openai;

pub use openai::OpenAiChatClient;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
}

/// Model provider settings as found in the `model` section of the
/// configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Inline key; takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAiCompatible,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            api_key: None,
            timeout_ms: 60_000,
        }
    }
}

impl ProviderConfig {
    fn resolve_api_key(&self) -> Result<Option<String>, RouterError> {
        if let Some(key) = self.api_key.as_ref().filter(|key| !key.is_empty()) {
            return Ok(Some(key.clone()));
        }
        match &self.api_key_env {
            Some(env) => match std::env::var(env) {
                Ok(key) if !key.is_empty() => Ok(Some(key)),
                _ => Err(RouterError::MissingApiKey { env: env.clone() }),
            },
            None => Ok(None),
        }
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("environment variable {env} holding the model API key is not set")]
    MissingApiKey { env: String },
    #[error("requested provider is unavailable: {0:?}")]
    ProviderUnavailable(Provider),
    #[error("failed to build model client: {0:#}")]
    Client(anyhow::Error),
}

#[derive(Clone)]
pub struct LlmRouter {
    provider: Provider,
    openai_client: Arc<OpenAiChatClient>,
}

impl LlmRouter {
    pub fn new(config: &ProviderConfig) -> Result<Self, RouterError> {
        let api_key = config.resolve_api_key()?;
        let client = OpenAiChatClient::new(
            &config.base_url,
            config.model.clone(),
            api_key,
            Duration::from_millis(config.timeout_ms),
        )
        .map_err(RouterError::Client)?;
        Ok(Self {
            provider: config.provider,
            openai_client: Arc::new(client),
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn route(&self) -> Arc<dyn LanguageModelClient> {
        match self.provider {
            Provider::OpenAiCompatible => self.openai_client.clone(),
        }
    }

    pub fn route_to(
        &self,
        provider: Provider,
    ) -> Result<Arc<dyn LanguageModelClient>, RouterError> {
        if provider != self.provider {
            return Err(RouterError::ProviderUnavailable(provider));
        }
        Ok(self.route())
    }
}
