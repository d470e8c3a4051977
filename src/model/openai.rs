//! OpenAI-compatible chat completions client

use super::{ModelClient, ModelError, ModelReply, TokenUsage};
use crate::context::payload::ChatMessage;
use crate::context::ContextPayload;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default system prompt for the chat model
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Be concise, friendly, \
and informative in your responses. You can help answer questions, have conversations, \
and assist with various tasks.";

/// Configuration for the chat model
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key (read from env OPENAI_API_KEY if not set)
    #[serde(default)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,
}

pub(crate) fn default_endpoint() -> String {
    "http://localhost:8080/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_max_retries() -> usize {
    3
}

fn default_system_prompt() -> Option<String> {
    Some(DEFAULT_SYSTEM_PROMPT.to_string())
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl ModelConfig {
    /// Fill the API key from OPENAI_API_KEY when the config has none
    pub fn from_env(mut self) -> Self {
        if self.api_key.is_none() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                self.api_key = Some(SecretString::new(key));
            }
        }
        self
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Thin HTTP client for `/chat/completions` with retry
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: usize,
}

/// Response of a successful completion call
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

impl ChatCompletionsClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            max_retries: max_retries.max(1),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat completion request, retrying transient failures
    pub async fn create(
        &self,
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
        max_tokens: Option<usize>,
    ) -> Result<Completion, ModelError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .into_iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content,
                })
                .collect(),
            max_tokens,
            temperature,
        };

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} for chat completion", attempt);
                tokio::time::sleep(retry_backoff(attempt)).await;
            }

            let mut req = self.client.post(&self.endpoint).json(&request);
            if let Some(ref api_key) = self.api_key {
                req = req.bearer_auth(api_key.expose_secret());
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        let err = ModelError::ApiError(format!("HTTP {}: {}", status, body));
                        if !is_retryable(status) {
                            return Err(err);
                        }
                        last_error = Some(err);
                        continue;
                    }

                    let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
                        ModelError::ApiError(format!("Failed to parse response: {}", e))
                    })?;
                    let choice = parsed.choices.into_iter().next().ok_or(ModelError::EmptyResponse)?;
                    return Ok(Completion {
                        content: choice.message.content,
                        usage: parsed.usage,
                    });
                }
                Err(e) if e.is_timeout() => {
                    last_error = Some(ModelError::Timeout);
                }
                Err(e) => {
                    last_error = Some(ModelError::NetworkError(e.to_string()));
                }
            }
        }

        warn!("Chat completion failed after {} attempts", self.max_retries);
        Err(last_error.unwrap_or(ModelError::EmptyResponse))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

const MAX_BACKOFF_MS: u64 = 10_000;

/// Exponential backoff from 100ms, capped at ten seconds
fn retry_backoff(attempt: usize) -> Duration {
    let factor = u32::try_from(attempt)
        .ok()
        .and_then(|shift| 1u64.checked_shl(shift))
        .unwrap_or(u64::MAX);
    Duration::from_millis(factor.saturating_mul(100).min(MAX_BACKOFF_MS))
}

/// Chat model backed by an OpenAI-compatible endpoint
pub struct OpenAiChatClient {
    http: ChatCompletionsClient,
    temperature: f32,
    system_prompt: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let http = ChatCompletionsClient::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.model.clone(),
            config.timeout(),
            config.max_retries,
        )?;
        Ok(Self {
            http,
            temperature: config.temperature,
            system_prompt: config.system_prompt,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiChatClient {
    async fn complete(&self, payload: &ContextPayload) -> Result<ModelReply, ModelError> {
        let messages = payload.to_chat_messages(self.system_prompt.as_deref());
        debug!(
            "Calling {} with {} messages (~{} tokens)",
            self.http.model(),
            messages.len(),
            payload.total_token_estimate()
        );

        let completion = self.http.create(messages, Some(self.temperature), None).await?;
        Ok(ModelReply {
            content: completion.content,
            usage: completion.usage,
        })
    }
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
}
