//! Core engine: the per-tick match, scan, simulate and publish pipeline.
//!
//! [`Engine`] is the sole owner of the portfolio. Ticks and resets both
//! run under the same async mutex, so a reset that arrives while a tick is
//! in flight waits for that tick to publish and then supersedes it. Readers
//! go through the [`SnapshotStore`] and never touch the mutex.

pub mod matcher;
pub mod scanner;
pub mod simulator;
pub mod store;

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::feed::QuoteSource;
use crate::types::QuoteSnapshot;
use matcher::MatcherConfig;
use scanner::ScanResult;
use simulator::{Marks, Portfolio, PortfolioSimulator, SimulatorConfig};
use store::{EngineSnapshot, PortfolioView, SnapshotStore};

/// Mutable state behind the engine lock.
struct EngineCore {
    tick: u64,
    portfolio: Portfolio,
    quotes: QuoteSnapshot,
    scan: ScanResult,
    errors: Vec<String>,
}

pub struct Engine {
    matcher: MatcherConfig,
    simulator: PortfolioSimulator,
    core: Mutex<EngineCore>,
    store: Arc<SnapshotStore>,
}

impl Engine {
    pub fn new(matcher: MatcherConfig, simulator: SimulatorConfig) -> Self {
        let portfolio = Portfolio::new(simulator.initial_capital);
        let store = Arc::new(SnapshotStore::new(EngineSnapshot::initial(&portfolio)));
        Self {
            matcher,
            simulator: PortfolioSimulator::new(simulator),
            core: Mutex::new(EngineCore {
                tick: 0,
                portfolio,
                quotes: QuoteSnapshot::default(),
                scan: ScanResult::default(),
                errors: Vec::new(),
            }),
            store,
        }
    }

    /// Latest published snapshot. Never blocks on a tick.
    pub fn read(&self) -> Arc<EngineSnapshot> {
        self.store.read()
    }

    /// Fetch from `source` and process one tick. A fetch failure still
    /// ticks, with the error recorded as a diagnostic.
    pub async fn run_tick(&self, source: &dyn QuoteSource) -> Arc<EngineSnapshot> {
        let quotes = match source.fetch().await {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(error = %e, "Quote fetch failed");
                QuoteSnapshot::failed(format!("{e:#}"))
            }
        };
        self.tick(quotes).await
    }

    /// Process one tick of quotes and publish the result.
    pub async fn tick(&self, quotes: QuoteSnapshot) -> Arc<EngineSnapshot> {
        let mut core = self.core.lock().await;
        core.tick += 1;
        let tick = core.tick;

        let scan = scanner::scan(&quotes, &self.matcher);
        let marks = Marks::from_quotes(&quotes);
        let report = self
            .simulator
            .on_tick(&core.portfolio, tick, scan.best(), &marks);

        let mut errors = quotes.errors.clone();
        errors.extend(scan.diagnostics.iter().cloned());
        errors.extend(report.diagnostics.iter().cloned());

        core.portfolio = report.portfolio;
        core.quotes = quotes;
        core.scan = scan;
        core.errors = errors;

        info!(
            tick,
            checks = core.scan.checks.len(),
            opportunities = core.scan.opportunities.len(),
            fills = report.fills.len(),
            cash = format!("${:.2}", core.portfolio.cash_balance),
            equity = format!("${:.2}", core.portfolio.total_equity),
            locked = format!("${:.2}", core.portfolio.locked_profit),
            diagnostics = core.errors.len(),
            "Tick complete"
        );

        self.store.publish(Self::snapshot_of(&core))
    }

    /// Replace the portfolio with a fresh one and republish. Quote state is
    /// left as it was. Waits for any in-flight tick.
    pub async fn reset(&self) -> Arc<EngineSnapshot> {
        let mut core = self.core.lock().await;
        core.portfolio = self.simulator.reset();
        info!(
            tick = core.tick,
            capital = %core.portfolio.cash_balance,
            "Simulation reset"
        );
        self.store.publish(Self::snapshot_of(&core))
    }

    fn snapshot_of(core: &EngineCore) -> EngineSnapshot {
        EngineSnapshot {
            timestamp: Utc::now(),
            tick: core.tick,
            polymarket: core.quotes.polymarket.clone(),
            kalshi: core.quotes.kalshi.clone(),
            price_to_beat: core.scan.price_to_beat,
            checks: core.scan.checks.clone(),
            opportunities: core.scan.opportunities.clone(),
            portfolio: PortfolioView::from(&core.portfolio),
            last_action: core.portfolio.last_action.clone(),
            errors: core.errors.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
