//! HTTP API: Axum server exposing the contract entry points.
//!
//! Write entry points identify the caller through the `x-sender-address`
//! header. CORS is open so browser front-ends can call the node directly.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use routes::{AppState, SENDER_HEADER};

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SENDER_HEADER)]);

    Router::new()
        .route("/api/bets", get(routes::get_bets).post(routes::create_bet))
        .route("/api/bets/:bet_id/resolve", post(routes::resolve_bet))
        .route("/api/points", get(routes::get_points))
        .route("/api/points/:address", get(routes::get_player_points))
        .route("/api/greeting", get(routes::get_greeting).post(routes::set_greeting))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API address {addr}"))?;
    info!(%addr, "API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
