//! HTTP client for OpenAI-compatible chat completion APIs
//!
//! Defaults target Mistral's hosted API, but any endpoint that speaks the
//! `/chat/completions` dialect with `tools` support works.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::tool_use::{
    ChatBackend, ChatError, ChatMessage, ModelReply, ModelResponse, Tool, Usage,
};

/// Default API base (Mistral)
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "mistral-large-latest";

/// Connection settings for [`ChatClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, without the trailing `/chat/completions`
    pub base_url: String,
    /// Bearer credential
    pub api_key: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Attempts per request for transient failures (429, 5xx, connect errors)
    pub max_attempts: u32,
    /// Base delay between attempts; grows linearly with the attempt number
    pub retry_delay_ms: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            request_timeout: Duration::from_secs(300),
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Client for a `/chat/completions` endpoint with tool support
#[derive(Clone)]
pub struct ChatClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[Tool]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(tools);
            body["tool_choice"] = serde_json::json!("auto");
        }

        body
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<ModelResponse, ChatError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ChatError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        parse_completion(&text)
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[Tool],
    ) -> Result<ModelResponse, ChatError> {
        let body = self.request_body(messages, tools);
        let attempts = self.config.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.send_once(&body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = Duration::from_millis(self.config.retry_delay_ms * attempt as u64);
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Transient backend error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Convert a raw completion body into a [`ModelResponse`]
fn parse_completion(text: &str) -> Result<ModelResponse, ChatError> {
    let completion: CompletionResponse = serde_json::from_str(text)?;

    let usage = completion
        .usage
        .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    let message = completion
        .choices
        .into_iter()
        .next()
        .ok_or(ChatError::EmptyResponse)?
        .message;

    let calls = message.tool_calls.unwrap_or_default();
    debug!(tool_calls = calls.len(), input_tokens = usage.input_tokens, output_tokens = usage.output_tokens, "Completion received");

    let reply = if calls.is_empty() {
        ModelReply::Text(message.content)
    } else {
        ModelReply::ToolCalls {
            content: message.content,
            calls,
        }
    };

    Ok(ModelResponse { reply, usage })
}
