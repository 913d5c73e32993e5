//! Football prediction contract.
//!
//! Players create bets on a match outcome and later resolve them. A bet is
//! resolved by reading the final result off a scores page through the
//! extraction protocol; a correct prediction earns the player one point.
//! Bets are namespaced per player: every write looks up the caller's own
//! sub-map, so a player can only resolve their own bets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::extraction::check_match;
use super::TxContext;
use crate::storage::Ledger;
use crate::types::{Address, Bet, BetError, MatchResult, Winner};

/// Scores-and-fixtures page the result is read from, one page per date.
pub const DEFAULT_SCORES_BASE_URL: &str = "https://www.bbc.com/sport/football/scores-fixtures";

fn default_scores_base_url() -> String {
    DEFAULT_SCORES_BASE_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootballBets {
    /// player -> bet id -> bet
    pub bets: Ledger<Address, Ledger<String, Bet>>,
    /// player -> correct predictions
    pub points: Ledger<Address, u64>,
    #[serde(skip, default = "default_scores_base_url")]
    scores_base_url: String,
}

impl Default for FootballBets {
    fn default() -> Self {
        Self::with_scores_base_url(DEFAULT_SCORES_BASE_URL)
    }
}

impl FootballBets {
    pub fn with_scores_base_url(base: &str) -> Self {
        Self {
            bets: Ledger::new(),
            points: Ledger::new(),
            scores_base_url: base.trim_end_matches('/').to_string(),
        }
    }

    /// Point the contract at a different scores site (config / tests).
    pub fn set_scores_base_url(&mut self, base: &str) {
        self.scores_base_url = base.trim_end_matches('/').to_string();
    }

    /// Resolution URL for a normalized `YYYY-MM-DD` date.
    pub fn resolution_url(&self, game_date: &str) -> String {
        format!("{}/{}", self.scores_base_url, urlencoding::encode(game_date))
    }

    // -- Writes ----------------------------------------------------------

    /// Record a new unresolved bet for `sender`. Returns the bet id.
    pub fn create_bet(
        &mut self,
        sender: Address,
        game_date: &str,
        team1: &str,
        team2: &str,
        predicted_winner: &str,
    ) -> Result<String, BetError> {
        let game_date = normalize_game_date(game_date)?;
        let (team1, team2) = validate_teams(team1, team2)?;
        let predicted: Winner = predicted_winner.parse()?;

        let bet_id = bet_id(&game_date, team1, team2);
        let resolution_url = self.resolution_url(&game_date);

        let bets_by_sender = self.bets.get_or_insert_default(sender);
        if bets_by_sender.contains_key(&bet_id) {
            warn!(sender = %sender, bet_id = %bet_id, "Duplicate bet rejected");
            return Err(BetError::DuplicateBet(bet_id));
        }

        let bet = Bet::new(
            bet_id.clone(),
            game_date,
            resolution_url,
            team1.to_string(),
            team2.to_string(),
            predicted,
        );
        info!(sender = %sender, bet = %bet, "Bet created");
        bets_by_sender.insert(bet_id.clone(), bet);

        Ok(bet_id)
    }

    /// Resolve one of the caller's bets against the agreed match result.
    ///
    /// Nothing is written unless the match has finished; the bet update and
    /// the point award are applied together after every check has passed.
    pub async fn resolve_bet(&mut self, ctx: &TxContext<'_>, bet_id: &str) -> Result<(), BetError> {
        let pending = self.pending_resolution(&ctx.sender, bet_id)?;
        let result = pending.fetch_result(ctx).await?;
        self.apply_resolution(ctx.sender, bet_id, result).map(|_| ())
    }

    /// First half of a resolve: check the bet can be resolved and capture
    /// what the extraction protocol needs. Does not touch state.
    pub fn pending_resolution(&self, sender: &Address, bet_id: &str) -> Result<PendingResolution, BetError> {
        let bet = self.open_bet(sender, bet_id)?;
        Ok(PendingResolution {
            bet_id: bet.id.clone(),
            resolution_url: bet.resolution_url.clone(),
            team1: bet.team1.clone(),
            team2: bet.team2.clone(),
        })
    }

    /// Second half of a resolve: commit an agreed match result.
    ///
    /// The bet is checked again, since state may have moved while the
    /// oracle was running. Returns whether the prediction was correct.
    pub fn apply_resolution(
        &mut self,
        sender: Address,
        bet_id: &str,
        result: MatchResult,
    ) -> Result<bool, BetError> {
        self.open_bet(&sender, bet_id)?;

        if !result.is_finished() {
            info!(sender = %sender, bet_id, "Game not finished; bet left open");
            return Err(BetError::NotFinished(bet_id.to_string()));
        }

        let key = bet_id.to_string();
        let bet = self
            .bets
            .get_mut(&sender)
            .and_then(|by_sender| by_sender.get_mut(&key))
            .ok_or_else(|| BetError::NotFound(key.clone()))?;

        bet.has_resolved = true;
        bet.real_winner = result.winner.to_string();
        bet.real_score = result.score;
        let correct = bet.is_correct();

        if correct {
            *self.points.get_or_insert_default(sender) += 1;
        }

        info!(
            sender = %sender,
            bet_id,
            real_winner = %result.winner,
            correct,
            points = self.points.get_or_default(&sender),
            "Bet resolved"
        );
        Ok(correct)
    }

    fn open_bet(&self, sender: &Address, bet_id: &str) -> Result<&Bet, BetError> {
        let key = bet_id.to_string();
        let bet = self
            .bets
            .get(sender)
            .and_then(|by_sender| by_sender.get(&key))
            .ok_or_else(|| BetError::NotFound(key.clone()))?;

        if bet.has_resolved {
            return Err(BetError::AlreadyResolved(key));
        }
        Ok(bet)
    }

    // -- Views -----------------------------------------------------------

    /// Every player's bets, keyed by hex address, in creation order.
    pub fn get_bets(&self) -> Ledger<String, Ledger<String, Bet>> {
        self.bets
            .iter()
            .map(|(addr, bets)| (addr.as_hex(), bets.clone()))
            .collect()
    }

    /// Every player's points, keyed by hex address, in first-score order.
    pub fn get_points(&self) -> Ledger<String, u64> {
        self.points
            .iter()
            .map(|(addr, points)| (addr.as_hex(), *points))
            .collect()
    }

    /// One player's points; 0 if they never scored.
    pub fn get_player_points(&self, player: &Address) -> u64 {
        self.points.get_or_default(player)
    }
}

// ---------------------------------------------------------------------------
// Pending resolution
// ---------------------------------------------------------------------------

/// Snapshot of an open bet, taken before the oracle round so no contract
/// state needs to be held while validators run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResolution {
    pub bet_id: String,
    pub resolution_url: String,
    pub team1: String,
    pub team2: String,
}

impl PendingResolution {
    /// Run the extraction protocol for this bet's match.
    pub async fn fetch_result(&self, ctx: &TxContext<'_>) -> Result<MatchResult, BetError> {
        check_match(ctx.oracle, ctx.consensus, &self.resolution_url, &self.team1, &self.team2).await
    }
}

// ---------------------------------------------------------------------------
// Input normalization
// ---------------------------------------------------------------------------

/// `lowercase("{game_date}_{team1}_{team2}")`
pub fn bet_id(game_date: &str, team1: &str, team2: &str) -> String {
    format!("{game_date}_{team1}_{team2}").to_lowercase()
}

/// Accept `YYYY-MM-DD` or `MM/DD/YYYY` and return `YYYY-MM-DD`.
pub fn normalize_game_date(input: &str) -> Result<String, BetError> {
    let s = input.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| {
            BetError::InvalidBet(format!(
                "invalid game date {input:?}, use YYYY-MM-DD or MM/DD/YYYY"
            ))
        })
}

fn validate_teams<'a>(team1: &'a str, team2: &'a str) -> Result<(&'a str, &'a str), BetError> {
    let (team1, team2) = (team1.trim(), team2.trim());
    if team1.is_empty() || team2.is_empty() {
        return Err(BetError::InvalidBet("both team names are required".into()));
    }
    if team1.to_lowercase() == team2.to_lowercase() {
        return Err(BetError::InvalidBet("teams must be different".into()));
    }
    Ok((team1, team2))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
