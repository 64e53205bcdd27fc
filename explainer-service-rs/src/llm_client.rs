// explainer-service-rs/src/llm_client.rs
//
// HTTP client for OpenAI-compatible chat completion backends
//
// This module provides:
// - The `ChatBackend` seam the explanation service talks to
// - `LlmClient`, a reqwest implementation with bearer auth
// - Classification of HTTP and transport failures into `LlmError`
//
// Requests are single shot. There is no retry or backoff; the caller decides what a
// failure means.
//
// Configuration (see config_rs::BackendSettings):
// - GROQ_API_KEY / LLM_API_KEY: bearer credential (required)
// - LLM_API_URL: chat completions endpoint
// - LLM_MODEL: model identifier
// - LLM_TIMEOUT_SECS: request timeout

use async_trait::async_trait;
use config_rs::{BackendSettings, CREDENTIAL_VARS};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Text of the first candidate, if the backend returned any
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: CompletionMessage,
}

/// Assistant message; providers may send `null` content
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub total_tokens: u32,
}

/// Failures talking to the reasoning backend
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing credential: none of {0} is set")]
    MissingCredential(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // 401, 403
    #[error("Authentication failed: {0}")]
    Authentication(String),

    // 429
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    // Remaining 4xx
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // 5xx
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected status: {0}")]
    UnexpectedStatus(String),

    // Connection issues and timeouts
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LlmError {
    /// Short label for operator logs
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::MissingCredential(_) => "missing_credential",
            LlmError::Configuration(_) => "configuration",
            LlmError::Authentication(_) => "authentication",
            LlmError::RateLimitExceeded(_) => "rate_limited",
            LlmError::InvalidRequest(_) => "invalid_request",
            LlmError::ServerError(_) => "server_error",
            LlmError::UnexpectedStatus(_) => "unexpected_status",
            LlmError::NetworkError(_) => "network_error",
            LlmError::ParseError(_) => "parse_error",
        }
    }

    /// Credential absent or rejected by the backend
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            LlmError::MissingCredential(_) | LlmError::Authentication(_)
        )
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::Authentication(format!("{}: {}", status, body)),
            429 => LlmError::RateLimitExceeded(body),
            400..=499 => LlmError::InvalidRequest(format!("{}: {}", status, body)),
            500..=599 => LlmError::ServerError(format!("{}: {}", status, body)),
            _ => LlmError::UnexpectedStatus(format!("{}: {}", status, body)),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::NetworkError(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::NetworkError(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            LlmError::ParseError(format!("Failed to parse response: {}", err))
        } else {
            LlmError::NetworkError(err.to_string())
        }
    }
}

/// A chat completion backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError>;
}

pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
}

impl fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Build a client from settings. Fails with `MissingCredential` when no API key
    /// is configured, so callers learn about it before any request is attempted.
    pub fn new(settings: &BackendSettings) -> Result<Self, LlmError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| LlmError::MissingCredential(CREDENTIAL_VARS.join(" or ")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| LlmError::Configuration(err.to_string()))?;

        log::info!("LLM client initialized for {}", settings.api_url);

        Ok(Self {
            client,
            api_key,
            api_url: settings.api_url.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        log::debug!(
            "Sending chat completion to {} (model: {})",
            self.api_url,
            request.model
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, body));
        }

        let data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| LlmError::ParseError(format!("Failed to parse response: {}", err)))?;

        if let Some(usage) = &data.usage {
            log::debug!("LLM request completed. Used {} tokens", usage.total_tokens);
        }

        Ok(data)
    }
}
