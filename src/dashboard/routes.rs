//! Dashboard API route handlers.
//!
//! Read endpoints only ever touch the published snapshot, so they return
//! immediately even while a tick is computing. State is shared via
//! `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::engine::store::{EngineSnapshot, PortfolioView};
use crate::engine::Engine;
use crate::types::{Check, KalshiQuote, PolymarketQuote};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub engine: Arc<Engine>,
    /// Trades included in the simulation view.
    pub history_limit: usize,
}

impl DashboardState {
    pub fn new(engine: Arc<Engine>, history_limit: usize) -> Self {
        Self {
            engine,
            history_limit,
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageResponse {
    pub timestamp: DateTime<Utc>,
    pub polymarket: Option<PolymarketQuote>,
    pub kalshi: Option<KalshiQuote>,
    pub checks: Vec<Check>,
    pub opportunities: Vec<Check>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResponse {
    pub timestamp: DateTime<Utc>,
    pub tick: u64,
    /// Venue-A market the portfolio is trading against.
    pub market: Option<PolymarketQuote>,
    pub portfolio: PortfolioView,
    pub last_action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/snapshot
pub async fn get_snapshot(State(state): State<AppState>) -> Json<Arc<EngineSnapshot>> {
    Json(state.engine.read())
}

/// GET /arbitrage
pub async fn get_arbitrage(State(state): State<AppState>) -> Json<ArbitrageResponse> {
    let snap = state.engine.read();
    Json(ArbitrageResponse {
        timestamp: snap.timestamp,
        polymarket: snap.polymarket.clone(),
        kalshi: snap.kalshi.clone(),
        checks: snap.checks.clone(),
        opportunities: snap.opportunities.clone(),
        errors: snap.errors.clone(),
    })
}

/// GET /simulation
pub async fn get_simulation(State(state): State<AppState>) -> Json<SimulationResponse> {
    let snap = state.engine.read();
    Json(SimulationResponse {
        timestamp: Utc::now(),
        tick: snap.tick,
        market: snap.polymarket.clone(),
        portfolio: snap.portfolio.with_recent_history(state.history_limit),
        last_action: snap.last_action.clone(),
    })
}

/// POST /reset
pub async fn post_reset(State(state): State<AppState>) -> Json<MessageResponse> {
    let snap = state.engine.reset().await;
    info!(tick = snap.tick, "Reset requested via dashboard");
    Json(MessageResponse {
        message: "Simulation reset".to_string(),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
