//! Contracts hosted by the node.
//!
//! `ContractState` is everything the node persists. Write entry points take
//! a [`TxContext`] carrying the caller's identity and the non-deterministic
//! capabilities a transaction may use.

pub mod extraction;
pub mod football_bets;
pub mod greeting;

use serde::{Deserialize, Serialize};

use crate::nondet::consensus::ConsensusNormalizer;
use crate::nondet::Oracle;
use crate::types::Address;

pub use football_bets::FootballBets;
pub use greeting::GreetingStore;

/// Persisted state of every hosted contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractState {
    pub football_bets: FootballBets,
    #[serde(default)]
    pub greeting: GreetingStore,
}

/// Per-transaction execution context.
pub struct TxContext<'a> {
    pub sender: Address,
    pub oracle: &'a dyn Oracle,
    pub consensus: &'a dyn ConsensusNormalizer,
}

impl<'a> TxContext<'a> {
    pub fn new(sender: Address, oracle: &'a dyn Oracle, consensus: &'a dyn ConsensusNormalizer) -> Self {
        Self { sender, oracle, consensus }
    }
}
