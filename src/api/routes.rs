//! API route handlers.
//!
//! Writes take the write half of the contract lock; views take the read
//! half and never fail. A resolve holds no lock while the oracle round
//! runs: it snapshots the bet, runs consensus, then re-checks and commits
//! under a short write lock. A per-bet claim keeps a second resolve of the
//! same bet out while one is in flight.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::contracts::{ContractState, TxContext};
use crate::nondet::consensus::ConsensusNormalizer;
use crate::nondet::Oracle;
use crate::storage::{self, Ledger};
use crate::types::{Address, Bet, BetError, TxReceipt};

/// Header carrying the caller's account address on write requests.
pub const SENDER_HEADER: &str = "x-sender-address";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct NodeState {
    pub contracts: RwLock<ContractState>,
    oracle: Box<dyn Oracle>,
    consensus: Box<dyn ConsensusNormalizer>,
    /// Where committed state is written; `None` keeps it in memory only.
    state_file: Option<String>,
    /// Bets with a resolve currently waiting on the oracle.
    resolving: Mutex<HashSet<(Address, String)>>,
}

impl NodeState {
    pub fn new(
        contracts: ContractState,
        oracle: Box<dyn Oracle>,
        consensus: Box<dyn ConsensusNormalizer>,
        state_file: Option<String>,
    ) -> Self {
        Self {
            contracts: RwLock::new(contracts),
            oracle,
            consensus,
            state_file,
            resolving: Mutex::new(HashSet::new()),
        }
    }

    fn tx_context(&self, sender: Address) -> TxContext<'_> {
        TxContext::new(sender, self.oracle.as_ref(), self.consensus.as_ref())
    }

    /// Mark a bet as being resolved until the returned claim is dropped.
    fn claim_resolution(&self, sender: Address, bet_id: &str) -> Result<ResolutionClaim<'_>, BetError> {
        let key = (sender, bet_id.to_string());
        let mut resolving = self.resolving.lock().unwrap_or_else(|e| e.into_inner());
        if !resolving.insert(key.clone()) {
            return Err(BetError::ResolutionInProgress(bet_id.to_string()));
        }
        Ok(ResolutionClaim { node: self, key })
    }

    /// Save committed state. The write has already happened, so a failure
    /// here is logged rather than returned to the caller.
    fn persist(&self, contracts: &ContractState) {
        if let Some(ref path) = self.state_file {
            if let Err(e) = storage::save_state(contracts, Some(path)) {
                error!(error = %e, path = %path, "Failed to save state");
            }
        }
    }
}

pub type AppState = Arc<NodeState>;

struct ResolutionClaim<'a> {
    node: &'a NodeState,
    key: (Address, String),
}

impl Drop for ResolutionClaim<'_> {
    fn drop(&mut self) {
        self.node
            .resolving
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBetRequest {
    pub game_date: String,
    pub team1: String,
    pub team2: String,
    pub predicted_winner: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateBetResponse {
    pub bet_id: String,
    pub receipt: TxReceipt,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerPointsResponse {
    pub address: String,
    pub points: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetingBody {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Bet(BetError),
    BadRequest(String),
}

impl From<BetError> for ApiError {
    fn from(e: BetError) -> Self {
        ApiError::Bet(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Bet(e) => match e {
                BetError::InvalidBet(_) => StatusCode::UNPROCESSABLE_ENTITY,
                BetError::DuplicateBet(_) => StatusCode::CONFLICT,
                BetError::NotFound(_) => StatusCode::NOT_FOUND,
                BetError::AlreadyResolved(_) => StatusCode::CONFLICT,
                BetError::NotFinished(_) => StatusCode::CONFLICT,
                BetError::ResolutionInProgress(_) => StatusCode::CONFLICT,
                BetError::ExtractionConsensus(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::BadRequest(msg) => ErrorBody {
                error: "bad_request".to_string(),
                message: msg.clone(),
            },
            ApiError::Bet(e) => ErrorBody {
                error: e.kind().to_string(),
                message: e.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

fn sender_from(headers: &HeaderMap) -> Result<Address, ApiError> {
    let raw = headers
        .get(SENDER_HEADER)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {SENDER_HEADER} header")))?
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("{SENDER_HEADER} is not valid text")))?;
    raw.parse()
        .map_err(|e: anyhow::Error| ApiError::BadRequest(e.to_string()))
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/bets
pub async fn create_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateBetRequest>,
) -> Result<Json<CreateBetResponse>, ApiError> {
    let sender = sender_from(&headers)?;
    let mut contracts = state.contracts.write().await;

    let bet_id = contracts.football_bets.create_bet(
        sender,
        &req.game_date,
        &req.team1,
        &req.team2,
        &req.predicted_winner,
    )?;
    state.persist(&contracts);

    let receipt = TxReceipt::finalized("create_bet", sender);
    info!(tx_id = %receipt.tx_id, sender = %sender, bet_id = %bet_id, "create_bet finalized");
    Ok(Json(CreateBetResponse { bet_id, receipt }))
}

/// POST /api/bets/:bet_id/resolve
pub async fn resolve_bet(
    State(state): State<AppState>,
    Path(bet_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TxReceipt>, ApiError> {
    let sender = sender_from(&headers)?;

    if let Err(e) = resolve_unlocked(&state, sender, &bet_id).await {
        warn!(sender = %sender, bet_id = %bet_id, error = %e, "resolve_bet rejected");
        return Err(e.into());
    }

    let receipt = TxReceipt::finalized("resolve_bet", sender);
    info!(tx_id = %receipt.tx_id, sender = %sender, bet_id = %bet_id, "resolve_bet finalized");
    Ok(Json(receipt))
}

async fn resolve_unlocked(state: &NodeState, sender: Address, bet_id: &str) -> Result<(), BetError> {
    let _claim = state.claim_resolution(sender, bet_id)?;

    let pending = {
        let contracts = state.contracts.read().await;
        contracts.football_bets.pending_resolution(&sender, bet_id)?
    };

    let ctx = state.tx_context(sender);
    let result = pending.fetch_result(&ctx).await?;

    let mut contracts = state.contracts.write().await;
    contracts.football_bets.apply_resolution(sender, bet_id, result)?;
    state.persist(&contracts);
    Ok(())
}

/// GET /api/bets
pub async fn get_bets(State(state): State<AppState>) -> Json<Ledger<String, Ledger<String, Bet>>> {
    let contracts = state.contracts.read().await;
    Json(contracts.football_bets.get_bets())
}

/// GET /api/points
pub async fn get_points(State(state): State<AppState>) -> Json<Ledger<String, u64>> {
    let contracts = state.contracts.read().await;
    Json(contracts.football_bets.get_points())
}

/// GET /api/points/:address
pub async fn get_player_points(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<PlayerPointsResponse>, ApiError> {
    let player: Address = address
        .parse()
        .map_err(|e: anyhow::Error| ApiError::BadRequest(e.to_string()))?;
    let contracts = state.contracts.read().await;
    Ok(Json(PlayerPointsResponse {
        address: player.as_hex(),
        points: contracts.football_bets.get_player_points(&player),
    }))
}

/// GET /api/greeting
pub async fn get_greeting(State(state): State<AppState>) -> Json<GreetingBody> {
    let contracts = state.contracts.read().await;
    Json(GreetingBody {
        message: contracts.greeting.get_message().to_string(),
    })
}

/// POST /api/greeting
pub async fn set_greeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GreetingBody>,
) -> Result<Json<TxReceipt>, ApiError> {
    let sender = sender_from(&headers)?;
    let mut contracts = state.contracts.write().await;
    contracts.greeting.set_message(body.message);
    state.persist(&contracts);
    Ok(Json(TxReceipt::finalized("set_message", sender)))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
