use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default = "ModelOptions::default_temperature")]
    pub temperature: f32,
    #[serde(default = "ModelOptions::default_max_tokens")]
    pub max_tokens: Option<u32>,
}

impl ModelOptions {
    fn default_temperature() -> f32 {
        0.2
    }

    fn default_max_tokens() -> Option<u32> {
        Some(1024)
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: Self::default_temperature(),
            max_tokens: Self::default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageModelUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageModelResponse {
    pub text: String,
    pub usage: LanguageModelUsage,
}

impl LanguageModelResponse {
    pub fn new(text: String) -> Self {
        Self {
            text,
            usage: LanguageModelUsage::default(),
        }
    }
}

/// Text generation collaborator. One call, one complete reply.
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &ModelOptions,
    ) -> Result<LanguageModelResponse>;
}
