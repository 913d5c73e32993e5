//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::contracts::football_bets::DEFAULT_SCORES_BASE_URL;
use crate::storage::DEFAULT_STATE_FILE;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub node: NodeConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    pub scores_base_url: String,
    pub render_timeout_secs: u64,
    pub user_agent: String,
    /// Page text beyond this many characters is cut before prompting.
    pub max_page_chars: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            scores_base_url: DEFAULT_SCORES_BASE_URL.to_string(),
            render_timeout_secs: 30,
            user_agent: "football-bets/0.1.0".to_string(),
            max_page_chars: 40_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// "openrouter" | "anthropic"
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    /// Fallback model for OpenRouter (used when primary model fails).
    #[serde(default)]
    pub fallback_model: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsensusConfig {
    /// Independent executions per non-deterministic call, leader included.
    pub validators: usize,
    /// Byte-identical executions required to accept a result.
    pub quorum: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self { validators: 3, quorum: 3 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

fn default_state_file() -> String {
    DEFAULT_STATE_FILE.to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let c = &self.consensus;
        if c.validators == 0 || c.quorum == 0 || c.quorum > c.validators {
            anyhow::bail!(
                "consensus.quorum must be between 1 and consensus.validators ({}), got {}",
                c.validators,
                c.quorum
            );
        }
        if !matches!(self.llm.provider.as_str(), "openrouter" | "anthropic") {
            anyhow::bail!("Unknown llm.provider: {}", self.llm.provider);
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The LLM API key, wrapped so it never shows up in logs.
    pub fn llm_api_key(&self) -> Result<SecretString> {
        Self::resolve_env(&self.llm.api_key_env).map(SecretString::new)
    }
}
