//! OpenRouter LLM integration.
//!
//! Routes prompt evaluation through OpenRouter's unified API, giving access
//! to multiple model providers with a single API key. Uses the
//! OpenAI-compatible chat completions format. Requests are sent with
//! temperature 0 so validators re-running the same prompt have the best
//! chance of producing identical answers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::{backoff_delay, is_retryable, LanguageModel, MAX_RETRIES};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default primary model via OpenRouter.
const DEFAULT_PRIMARY_MODEL: &str = "anthropic/claude-sonnet-4";

const DEFAULT_MAX_TOKENS: u32 = 512;

/// System prompt shared by every extraction request.
pub const SYSTEM_PROMPT: &str = "You extract facts from web page text. \
     Answer with exactly what the user asks for and nothing else.";

// ---------------------------------------------------------------------------
// API types (OpenAI-compatible)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

impl ChatResponse {
    fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.as_str())
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenRouterClient {
    http: Client,
    api_key: SecretString,
    primary_model: String,
    fallback_model: Option<String>,
    max_tokens: u32,
    total_calls: AtomicU64,
}

impl OpenRouterClient {
    /// Create a new OpenRouter client.
    ///
    /// - `api_key`: OpenRouter API key.
    /// - `primary_model`: Primary model ID (e.g. "anthropic/claude-sonnet-4").
    /// - `fallback_model`: Optional fallback model for when primary fails.
    /// - `max_tokens`: Max output tokens per request.
    pub fn new(
        api_key: SecretString,
        primary_model: Option<String>,
        fallback_model: Option<String>,
        max_tokens: Option<u32>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build OpenRouter HTTP client")?;

        Ok(Self {
            http,
            api_key,
            primary_model: primary_model.unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model,
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_calls: AtomicU64::new(0),
        })
    }

    fn build_request(&self, model: &str, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
        }
    }

    /// Send a chat completion request for a specific model, with retry +
    /// exponential backoff.
    async fn call_model(&self, model: &str, prompt: &str) -> Result<String> {
        let request = self.build_request(model, prompt);
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, model, "Retrying OpenRouter API call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(OPENROUTER_API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
                .header("Content-Type", "application/json")
                .header("X-Title", "football-bets node")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response
                            .json()
                            .await
                            .context("Failed to parse OpenRouter response")?;

                        self.total_calls.fetch_add(1, Ordering::Relaxed);

                        return body
                            .text()
                            .map(str::to_string)
                            .ok_or_else(|| anyhow::anyhow!("OpenRouter returned no choices (model={model})"));
                    }

                    if is_retryable(status) {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(
                            status = %status,
                            attempt,
                            model,
                            error = %error_text,
                            "Retryable OpenRouter error"
                        );
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("OpenRouter API error {status} (model={model}): {error_text}");
                }
                Err(e) => {
                    warn!(attempt, model, error = %e, "OpenRouter request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "OpenRouter API failed after {} retries (model={}): {}",
            MAX_RETRIES,
            model,
            last_error.unwrap_or_default()
        )
    }

    /// Total number of successful API calls made.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LanguageModel for OpenRouterClient {
    /// Call the primary model, falling back to the secondary if configured
    /// and the primary fails.
    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.call_model(&self.primary_model, prompt).await {
            Ok(text) => Ok(text),
            Err(primary_err) => {
                let Some(ref fallback) = self.fallback_model else {
                    return Err(primary_err);
                };
                warn!(
                    primary = %self.primary_model,
                    fallback = %fallback,
                    error = %primary_err,
                    "Primary model failed, falling back"
                );
                self.call_model(fallback, prompt).await.with_context(|| {
                    format!(
                        "Both primary ({}) and fallback ({}) models failed. Primary error: {}",
                        self.primary_model, fallback, primary_err
                    )
                })
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.primary_model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
