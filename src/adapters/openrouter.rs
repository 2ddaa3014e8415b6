//! OpenRouter chat-completions generator.
//!
//! Endpoint: POST {base_url}/chat/completions
//! Auth: Bearer token from OPENROUTER_API_KEY (or OPENAI_API_KEY)
//!
//! Transient failures (rate limits, connection errors, 5xx) are retried with
//! exponential backoff up to `max_retries` attempts.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{GenerationError, GenerationRequest, Generator};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// HTTP chat-completions generator
pub struct OpenRouterGenerator {
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Outcome of one HTTP attempt
enum Attempt {
    Done(String),
    Retry(String),
    Fatal(String),
}

impl OpenRouterGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_retries: max_retries.max(1),
            client: reqwest::Client::new(),
        }
    }

    /// Create from environment variables
    pub fn from_env(model: String, max_retries: u32) -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .context("OPENROUTER_API_KEY or OPENAI_API_KEY environment variable required")?;
        let model = std::env::var("OPENROUTER_MODEL").unwrap_or(model);

        let mut generator = Self::new(api_key, model, max_retries);
        if let Ok(base_url) = std::env::var("OPENROUTER_BASE_URL") {
            generator.base_url = base_url;
        }
        Ok(generator)
    }

    /// Point at another OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn attempt(&self, request: &GenerationRequest) -> Attempt {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        };

        let response = match self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(format!("connection error: {}", e)),
        };

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Attempt::Retry(format!("HTTP {}", status));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Attempt::Fatal(format!("HTTP {}: {}", status, text));
        }

        match response.text().await {
            Ok(text) => match parse_reply(&text) {
                Some(content) => Attempt::Done(content),
                None => Attempt::Fatal("response has no message content".to_string()),
            },
            Err(e) => Attempt::Retry(format!("failed to read body: {}", e)),
        }
    }
}

/// Extract the first choice's content from a chat-completions body
fn parse_reply(body: &str) -> Option<String> {
    let response: ChatResponse = serde_json::from_str(body).ok()?;
    response
        .choices
        .into_iter()
        .next()?
        .message
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Wait before retry `attempt` (0-based): 1s, 2s, 4s, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

#[async_trait]
impl Generator for OpenRouterGenerator {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut last_error = String::new();

        for attempt in 0..self.max_retries {
            info!(attempt = attempt + 1, max = self.max_retries, model = %self.model, "LLM call");

            match self.attempt(request).await {
                Attempt::Done(content) => return Ok(content),
                Attempt::Fatal(message) => {
                    return Err(GenerationError::Failed {
                        generator: self.name().to_string(),
                        message,
                    })
                }
                Attempt::Retry(message) => {
                    warn!(attempt = attempt + 1, error = %message, "LLM call failed, retrying");
                    last_error = message;
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                    }
                }
            }
        }

        Err(GenerationError::Failed {
            generator: self.name().to_string(),
            message: format!("failed after {} attempts: {}", self.max_retries, last_error),
        })
    }
}
