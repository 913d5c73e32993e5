//! FOOTBALL BETS: Intelligent-contract node for football match predictions
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores contract state from disk (or creates fresh), wires the
//! oracle and validator quorum, and serves the HTTP API until Ctrl+C.

use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

use football_bets::api::{self, routes::NodeState};
use football_bets::config;
use football_bets::contracts::ContractState;
use football_bets::llm::anthropic::AnthropicClient;
use football_bets::llm::openrouter::OpenRouterClient;
use football_bets::llm::LanguageModel;
use football_bets::nondet::consensus::ValidatorQuorum;
use football_bets::nondet::NodeOracle;
use football_bets::storage;
use football_bets::web::WebRenderer;

const BANNER: &str = r#"
  ___         _   _         _ _   ___      _
 | __|__  ___| |_| |__  __ _| | | | _ ) ___| |_ ___
 | _/ _ \/ _ \  _| '_ \/ _` | | | | _ \/ -_)  _(_-<
 |_|\___/\___/\__|_.__/\__,_|_|_| |___/\___|\__/__/

  Prediction contracts resolved by validator consensus
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        node_name = %cfg.node.name,
        validators = cfg.consensus.validators,
        quorum = cfg.consensus.quorum,
        "Football bets node starting up"
    );

    // -- Restore or create state -----------------------------------------

    let mut state = match storage::load_state(Some(&cfg.node.state_file))? {
        Some(s) => {
            info!(
                players = s.football_bets.bets.len(),
                scored = s.football_bets.points.len(),
                "Resumed from saved state"
            );
            s
        }
        None => {
            info!("Fresh start");
            ContractState::default()
        }
    };
    state.football_bets.set_scores_base_url(&cfg.oracle.scores_base_url);

    // -- Initialise components -------------------------------------------

    let web = WebRenderer::new(
        cfg.oracle.render_timeout_secs,
        &cfg.oracle.user_agent,
        cfg.oracle.max_page_chars,
    )?;

    let api_key = cfg.llm_api_key().unwrap_or_else(|e| {
        warn!(error = %e, "No LLM API key configured, bet resolution will fail");
        SecretString::new(String::new())
    });

    let llm: Box<dyn LanguageModel> = match cfg.llm.provider.as_str() {
        "anthropic" => {
            info!(model = %cfg.llm.model, "Using Anthropic LLM provider");
            Box::new(AnthropicClient::new(
                api_key,
                Some(cfg.llm.model.clone()),
                Some(cfg.llm.max_tokens),
            )?)
        }
        _ => {
            info!(
                model = %cfg.llm.model,
                fallback = ?cfg.llm.fallback_model,
                "Using OpenRouter LLM provider"
            );
            Box::new(OpenRouterClient::new(
                api_key,
                Some(cfg.llm.model.clone()),
                cfg.llm.fallback_model.clone(),
                Some(cfg.llm.max_tokens),
            )?)
        }
    };

    let oracle = NodeOracle::new(web, llm);
    info!(model = %oracle.model_name(), "Oracle ready");
    let quorum = ValidatorQuorum::new(cfg.consensus.validators, cfg.consensus.quorum)?;

    let node = Arc::new(NodeState::new(
        state,
        Box::new(oracle),
        Box::new(quorum),
        Some(cfg.node.state_file.clone()),
    ));

    // -- Serve -----------------------------------------------------------

    info!("Serving API. Press Ctrl+C to stop.");
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received.");
    };
    api::serve(node.clone(), &cfg.api.host, cfg.api.port, shutdown).await?;

    // Save final state
    let contracts = node.contracts.read().await;
    storage::save_state(&contracts, Some(&cfg.node.state_file))?;
    info!(
        players = contracts.football_bets.bets.len(),
        scored = contracts.football_bets.points.len(),
        "Football bets node shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("football_bets=info"));

    let json_logging = std::env::var("FOOTBALL_BETS_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
