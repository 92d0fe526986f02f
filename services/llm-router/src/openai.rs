use std::time::Duration;

use ai_agent::{
    ChatMessage, LanguageModelClient, LanguageModelResponse, LanguageModelUsage, ModelOptions,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<LanguageModelUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any endpoint speaking the OpenAI `/chat/completions` dialect.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LanguageModelClient for OpenAiChatClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &ModelOptions,
    ) -> Result<LanguageModelResponse> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let mut request = self.http.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        debug!(model = %self.model, messages = messages.len(), "sending chat completion");

        let response = request
            .send()
            .await
            .context("chat completion request failed")?;
        let status = response.status();
        let text = response
            .text()
            .await
            .context("failed to read chat completion body")?;
        if !status.is_success() {
            return Err(anyhow!("chat completion returned {status}: {text}"));
        }
        parse_completion(&text)
    }
}

fn parse_completion(body: &str) -> Result<LanguageModelResponse> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).context("failed to parse chat completion response")?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("chat completion contained no choices"))?
        .message
        .content
        .unwrap_or_default();
    Ok(LanguageModelResponse {
        text: content,
        usage: parsed.usage.unwrap_or_default(),
    })
}
