//! Non-deterministic capabilities consumed by the contracts.
//!
//! Defines the `Oracle` trait (web rendering + prompt evaluation) and the
//! default `NodeOracle`, which composes a [`WebRenderer`] with a
//! [`LanguageModel`]. Consensus over non-deterministic results lives in
//! [`consensus`].

pub mod consensus;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use tracing::debug;

use crate::llm::LanguageModel;
use crate::web::WebRenderer;

/// How a fetched page is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Visible text only, markup stripped.
    Text,
    /// Raw HTML body.
    Html,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Text => write!(f, "text"),
            RenderMode::Html => write!(f, "html"),
        }
    }
}

/// Abstraction over the node's non-deterministic oracle.
///
/// Any failure (timeout, HTTP error, empty page, LLM outage) is returned
/// as an error and treated by callers as a failed execution.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Fetch a URL and return its rendered content.
    async fn render_page(&self, url: &str, mode: RenderMode) -> Result<String>;

    /// Submit a natural-language task to a language model and return the
    /// raw response text.
    async fn exec_prompt(&self, prompt: &str) -> Result<String>;
}

/// Oracle backed by a real HTTP renderer and LLM client.
pub struct NodeOracle {
    web: WebRenderer,
    llm: Box<dyn LanguageModel>,
}

impl NodeOracle {
    pub fn new(web: WebRenderer, llm: Box<dyn LanguageModel>) -> Self {
        Self { web, llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }
}

#[async_trait]
impl Oracle for NodeOracle {
    async fn render_page(&self, url: &str, mode: RenderMode) -> Result<String> {
        debug!(url, %mode, "Rendering page");
        self.web
            .render(url, mode)
            .await
            .with_context(|| format!("Failed to render {url}"))
    }

    async fn exec_prompt(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.llm.model_name(), prompt_len = prompt.len(), "Executing prompt");
        self.llm
            .complete(prompt)
            .await
            .with_context(|| format!("Prompt execution failed ({})", self.llm.model_name()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
