//! LLM integration for prompt evaluation.
//!
//! Defines the `LanguageModel` trait and provides implementations for
//! OpenRouter (OpenAI-compatible, multi-provider) and Anthropic.

pub mod anthropic;
pub mod openrouter;

use anyhow::Result;
use async_trait::async_trait;

/// Maximum retries on rate limit / server errors.
pub(crate) const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
pub(crate) const BASE_BACKOFF_MS: u64 = 1000;

/// Abstraction over LLM completion endpoints.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a single user prompt and return the model's raw text answer.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}

/// Backoff delay before retry `attempt` (1-based).
pub(crate) fn backoff_delay(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt.saturating_sub(1)))
}

/// Status codes worth retrying: 429 (rate limit) and any 5xx.
pub(crate) fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}
