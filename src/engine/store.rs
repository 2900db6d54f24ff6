//! Snapshot store, the single published view read by the dashboard.
//!
//! The engine builds a complete [`EngineSnapshot`] per tick and swaps it in
//! behind an `Arc`. Readers clone the `Arc` under a read lock held only for
//! that clone, so a reader never waits on tick computation and never sees
//! quotes from one tick next to a portfolio from another.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::engine::simulator::Portfolio;
use crate::types::{Check, KalshiQuote, PolymarketQuote, Trade};

// ---------------------------------------------------------------------------
// Published view
// ---------------------------------------------------------------------------

/// Read-only portfolio figures exposed to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioView {
    pub cash_balance: Decimal,
    pub total_equity: Decimal,
    pub locked_profit: Decimal,
    pub settled_pairs: Decimal,
    pub projected_value: Decimal,
    pub qty_yes: Decimal,
    pub qty_no: Decimal,
    pub avg_cost_yes: Decimal,
    pub avg_cost_no: Decimal,
    pub pair_cost: Decimal,
    pub history: Arc<Vec<Trade>>,
}

impl From<&Portfolio> for PortfolioView {
    fn from(p: &Portfolio) -> Self {
        Self {
            cash_balance: p.cash_balance,
            total_equity: p.total_equity,
            locked_profit: p.locked_profit,
            settled_pairs: p.settled_pairs,
            projected_value: p.projected_value(),
            qty_yes: p.yes.qty,
            qty_no: p.no.qty,
            avg_cost_yes: p.yes.avg_cost,
            avg_cost_no: p.no.avg_cost,
            pair_cost: p.pair_cost(),
            history: Arc::clone(&p.trade_history),
        }
    }
}

impl PortfolioView {
    /// The same view keeping only the most recent `n` trades.
    pub fn with_recent_history(&self, n: usize) -> Self {
        let start = self.history.len().saturating_sub(n);
        Self {
            history: Arc::new(self.history[start..].to_vec()),
            ..self.clone()
        }
    }
}

/// Everything a reader can see, from exactly one tick (or one reset).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub timestamp: DateTime<Utc>,
    pub tick: u64,
    pub polymarket: Option<PolymarketQuote>,
    pub kalshi: Option<KalshiQuote>,
    pub price_to_beat: Option<Decimal>,
    pub checks: Vec<Check>,
    pub opportunities: Vec<Check>,
    pub portfolio: PortfolioView,
    pub last_action: String,
    /// Non-fatal diagnostics accumulated during the tick.
    pub errors: Vec<String>,
}

impl EngineSnapshot {
    /// The view published before the first tick.
    pub fn initial(portfolio: &Portfolio) -> Self {
        Self {
            timestamp: Utc::now(),
            tick: 0,
            polymarket: None,
            kalshi: None,
            price_to_beat: None,
            checks: Vec::new(),
            opportunities: Vec::new(),
            portfolio: PortfolioView::from(portfolio),
            last_action: portfolio.last_action.clone(),
            errors: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct SnapshotStore {
    current: RwLock<Arc<EngineSnapshot>>,
}

impl SnapshotStore {
    pub fn new(initial: EngineSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Atomically replace the visible snapshot.
    pub fn publish(&self, snapshot: EngineSnapshot) -> Arc<EngineSnapshot> {
        let snapshot = Arc::new(snapshot);
        let tick = snapshot.tick;
        // A poisoned lock still holds a complete Arc; keep serving it.
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&snapshot);
        drop(guard);
        debug!(tick, "Snapshot published");
        snapshot
    }

    /// The latest published snapshot.
    pub fn read(&self) -> Arc<EngineSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot_for(tick: u64) -> EngineSnapshot {
        let mut portfolio = Portfolio::new(dec!(100));
        portfolio.cash_balance = Decimal::from(tick);
        portfolio.last_action = format!("tick {tick}");
        let mut snap = EngineSnapshot::initial(&portfolio);
        snap.tick = tick;
        snap.errors = vec![format!("diag {tick}")];
        snap
    }

    #[test]
    fn test_read_returns_initial() {
        let store = SnapshotStore::new(snapshot_for(0));
        assert_eq!(store.read().tick, 0);
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let store = SnapshotStore::new(snapshot_for(0));
        let held = store.read();
        store.publish(snapshot_for(7));
        assert_eq!(store.read().tick, 7);
        // Earlier readers keep their own consistent copy.
        assert_eq!(held.tick, 0);
        assert_eq!(held.last_action, "tick 0");
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_state() {
        let store = SnapshotStore::new(snapshot_for(0));
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for tick in 1..=500 {
                    store.publish(snapshot_for(tick));
                }
            });
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut last = 0;
                    for _ in 0..500 {
                        let snap = store.read();
                        assert!(snap.tick >= last);
                        last = snap.tick;
                        assert_eq!(snap.portfolio.cash_balance, Decimal::from(snap.tick));
                        assert_eq!(snap.last_action, format!("tick {}", snap.tick));
                        assert_eq!(snap.errors, vec![format!("diag {}", snap.tick)]);
                    }
                });
            }
        });
        assert_eq!(store.read().tick, 500);
    }

    #[test]
    fn test_recent_history_keeps_tail() {
        use crate::types::{LegRef, Outcome, Side, Trade, Venue};
        let mut view = PortfolioView::from(&Portfolio::new(dec!(100)));
        let history = Arc::make_mut(&mut view.history);
        for i in 0..15u64 {
            history.push(Trade {
                id: uuid::Uuid::new_v4(),
                timestamp: Utc::now(),
                tick: i,
                side: Side::Yes,
                leg: LegRef {
                    venue: Venue::Kalshi,
                    outcome: Outcome::Yes,
                    strike: dec!(100000),
                },
                price: dec!(0.4),
                size: dec!(10),
            });
        }
        let recent = view.with_recent_history(10);
        assert_eq!(recent.history.len(), 10);
        assert_eq!(recent.history[0].tick, 5);
        assert_eq!(recent.cash_balance, view.cash_balance);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(&*SnapshotStore::new(snapshot_for(3)).read()).unwrap();
        assert_eq!(json["tick"], 3);
        assert!(json["portfolio"]["cash_balance"].is_number());
        assert!(json["checks"].as_array().unwrap().is_empty());
    }
}
