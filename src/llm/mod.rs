//! Language-model collaborator
//!
//! The router hands the full conversation to a [`LanguageModel`] and gets
//! the assistant reply back. [`ChatCompletionsClient`] talks to any
//! OpenAI-compatible `/chat/completions` endpoint (DeepSeek by default).

use crate::config::LlmConfig;
use crate::conversation::Turn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

/// Anything that can continue a conversation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce the next assistant reply for `history`
    async fn complete(&self, history: &[Turn]) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

/// Client for OpenAI-compatible chat completion APIs
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsClient {
    /// Build a client for one credential
    ///
    /// The credential is passed through as a bearer token; its format is not checked.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

// ── Chat completions request/response types ────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn parse_reply(body: &str) -> Result<String, LlmError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(&self, history: &[Turn]) -> Result<String, LlmError> {
        debug!(model = %self.model, turns = history.len(), "requesting chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages: history,
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "chat completion request failed");
                LlmError::Request(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(%status, "chat completion API error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parse_reply(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
