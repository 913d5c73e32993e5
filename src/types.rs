//! Shared types for the football-bets node.
//!
//! These types form the data model used by the contracts, the oracle
//! adapters and the HTTP surface. Storage field names follow the
//! snake_case record shape the contracts have always persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn as_hex(&self) -> String {
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for b in self.0 {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            anyhow::bail!("Invalid address (expected 40 hex digits): {s}");
        }

        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| anyhow::anyhow!("Invalid address (non-hex digit): {s}"))?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Bet
// ---------------------------------------------------------------------------

/// One prediction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    /// `lowercase("{game_date}_{team1}_{team2}")`
    pub id: String,
    pub has_resolved: bool,
    /// `YYYY-MM-DD`
    pub game_date: String,
    /// Built from the game date, never supplied by the player.
    pub resolution_url: String,
    pub team1: String,
    pub team2: String,
    /// "0" = draw, "1" = team1, "2" = team2
    pub predicted_winner: String,
    /// Same encoding as `predicted_winner`; empty until resolved.
    pub real_winner: String,
    /// "H:A" or "-"; empty until resolved.
    pub real_score: String,
}

impl Bet {
    /// A fresh, unresolved bet.
    pub fn new(
        id: String,
        game_date: String,
        resolution_url: String,
        team1: String,
        team2: String,
        predicted_winner: Winner,
    ) -> Self {
        Self {
            id,
            has_resolved: false,
            game_date,
            resolution_url,
            team1,
            team2,
            predicted_winner: predicted_winner.code().to_string(),
            real_winner: String::new(),
            real_score: String::new(),
        }
    }

    /// Whether the recorded result matches the prediction.
    pub fn is_correct(&self) -> bool {
        self.has_resolved && self.real_winner == self.predicted_winner
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_resolved {
            write!(
                f,
                "[{}] {} vs {} | predicted {} | result {} ({})",
                self.game_date, self.team1, self.team2,
                self.predicted_winner, self.real_winner, self.real_score,
            )
        } else {
            write!(
                f,
                "[{}] {} vs {} | predicted {} | pending",
                self.game_date, self.team1, self.team2, self.predicted_winner,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Winner
// ---------------------------------------------------------------------------

/// Typed view of the "0"/"1"/"2" outcome encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winner {
    Draw,
    Team1,
    Team2,
}

impl Winner {
    pub const ALL: &'static [Winner] = &[Winner::Draw, Winner::Team1, Winner::Team2];

    /// The storage encoding.
    pub fn code(&self) -> &'static str {
        match self {
            Winner::Draw => "0",
            Winner::Team1 => "1",
            Winner::Team2 => "2",
        }
    }

    /// Map an extraction winner code. Negative codes and anything above 2
    /// have no outcome.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Winner::Draw),
            1 => Some(Winner::Team1),
            2 => Some(Winner::Team2),
            _ => None,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Winner {
    type Err = BetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Winner::Draw),
            "1" => Ok(Winner::Team1),
            "2" => Ok(Winner::Team2),
            other => Err(BetError::InvalidBet(format!(
                "predicted winner must be \"0\", \"1\" or \"2\", got {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Match result
// ---------------------------------------------------------------------------

/// Winner code meaning the match has not finished.
pub const NOT_FINISHED: i64 = -1;

/// The structured answer the extraction protocol agrees on.
///
/// Field order matters: the serde encoding of this struct is the byte
/// string validators compare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: String,
    pub winner: i64,
}

impl MatchResult {
    pub fn not_finished() -> Self {
        Self { score: "-".to_string(), winner: NOT_FINISHED }
    }

    pub fn is_finished(&self) -> bool {
        self.winner >= 0
    }

    /// Canonical JSON encoding.
    pub fn to_canonical_json(&self) -> String {
        // Serializing a struct of a String and an i64 cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Transaction receipt
// ---------------------------------------------------------------------------

/// Returned by every successful write entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_id: Uuid,
    pub method: String,
    pub sender: Address,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl TxReceipt {
    pub fn finalized(method: &str, sender: Address) -> Self {
        Self {
            tx_id: Uuid::new_v4(),
            method: method.to_string(),
            sender,
            status: "FINALIZED".to_string(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Contract-level failures. Every variant aborts the call with no state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BetError {
    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Bet already created: {0}")]
    DuplicateBet(String),

    #[error("Bet not found: {0}")]
    NotFound(String),

    #[error("Bet already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Game not finished: {0}")]
    NotFinished(String),

    #[error("Bet is already being resolved: {0}")]
    ResolutionInProgress(String),

    #[error("Match result extraction failed: {0}")]
    ExtractionConsensus(String),
}

impl BetError {
    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BetError::InvalidBet(_) => "invalid_bet",
            BetError::DuplicateBet(_) => "duplicate_bet",
            BetError::NotFound(_) => "not_found",
            BetError::AlreadyResolved(_) => "already_resolved",
            BetError::NotFinished(_) => "not_finished",
            BetError::ResolutionInProgress(_) => "resolution_in_progress",
            BetError::ExtractionConsensus(_) => "extraction_consensus",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
