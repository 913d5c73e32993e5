//! Persistence layer.
//!
//! Saves and loads the full contract state to/from a JSON file. The
//! in-memory [`Ledger`] is the working store; the file is rewritten after
//! every committed write.

pub mod ledger;

pub use ledger::Ledger;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::contracts::ContractState;

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "football_bets_state.json";

/// Save contract state to a JSON file.
pub fn save_state(state: &ContractState, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(state)
        .context("Failed to serialise contract state")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write state to {path}"))?;

    debug!(
        path,
        players = state.football_bets.bets.len(),
        "State saved"
    );
    Ok(())
}

/// Load contract state from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<ContractState>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read state from {path}"))?;

    let state: ContractState = serde_json::from_str(&json)
        .context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        players = state.football_bets.bets.len(),
        scored = state.football_bets.points.len(),
        "State loaded from disk"
    );

    Ok(Some(state))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
