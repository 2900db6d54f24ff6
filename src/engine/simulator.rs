//! Portfolio simulator — paper execution of the best opportunity.
//!
//! Each tick runs in explicit phases against a scratch copy of the
//! portfolio:
//!
//! 1. decide whether (and how much) to trade,
//! 2. apply both fills with weighted-average cost accounting,
//! 3. settle matched YES/NO pairs into locked profit (at most once per tick),
//! 4. mark the remaining inventory to the latest asks,
//! 5. validate invariants.
//!
//! Only a portfolio that passes validation replaces the previous one.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::scanner::{kalshi_ask, poly_ask};
use crate::types::{
    wire_decimal, Check, LegRef, Outcome, QuoteSnapshot, Side, StrikeArbError, Trade, Venue, PAYOUT,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub initial_capital: Decimal,
    /// Pairs bought per fill when cash allows.
    pub trade_size: Decimal,
    /// Fills smaller than this are skipped.
    pub min_trade_size: Decimal,
    /// No trading below this cash balance.
    pub min_cash: Decimal,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100),
            trade_size: dec!(10),
            min_trade_size: dec!(1),
            min_cash: dec!(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

/// Inventory on one side of the book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub qty: Decimal,
    /// Weighted-average fill price; zero while flat.
    pub avg_cost: Decimal,
    /// Contract last bought on this side, used for marking.
    pub last_leg: Option<LegRef>,
}

impl Position {
    /// Add a fill using the weighted-average cost rule.
    fn fill(&mut self, size: Decimal, price: Decimal, leg: LegRef) {
        let new_qty = self.qty + size;
        self.avg_cost = (self.qty * self.avg_cost + size * price) / new_qty;
        self.qty = new_qty;
        self.last_leg = Some(leg);
    }

    fn reduce(&mut self, qty: Decimal) {
        self.qty -= qty;
        if self.qty.is_zero() {
            self.avg_cost = Decimal::ZERO;
            self.last_leg = None;
        }
    }

    pub fn is_flat(&self) -> bool {
        self.qty.is_zero()
    }
}

/// The virtual account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash_balance: Decimal,
    pub yes: Position,
    pub no: Position,
    pub locked_profit: Decimal,
    /// Matched pairs already settled into `locked_profit`, each awaiting a
    /// $1.00 payout.
    pub settled_pairs: Decimal,
    /// `cash + qty_yes × yes_mark + qty_no × no_mark`, refreshed every tick.
    pub total_equity: Decimal,
    /// Append-only. Shared with published snapshots until the next fill.
    pub trade_history: Arc<Vec<Trade>>,
    pub last_action: String,
    /// Last tick this portfolio processed.
    pub tick: u64,
    last_settled_tick: Option<u64>,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash_balance: initial_capital,
            yes: Position::default(),
            no: Position::default(),
            locked_profit: Decimal::ZERO,
            settled_pairs: Decimal::ZERO,
            total_equity: initial_capital,
            trade_history: Arc::new(Vec::new()),
            last_action: "Waiting for market...".to_string(),
            tick: 0,
            last_settled_tick: None,
        }
    }

    pub fn position(&self, side: Side) -> &Position {
        match side {
            Side::Yes => &self.yes,
            Side::No => &self.no,
        }
    }

    fn position_mut(&mut self, side: Side) -> &mut Position {
        match side {
            Side::Yes => &mut self.yes,
            Side::No => &mut self.no,
        }
    }

    /// `avg_cost_yes + avg_cost_no`.
    pub fn pair_cost(&self) -> Decimal {
        self.yes.avg_cost + self.no.avg_cost
    }

    pub fn matched_qty(&self) -> Decimal {
        self.yes.qty.min(self.no.qty)
    }

    /// Equity plus the guaranteed payout of settled pairs.
    pub fn projected_value(&self) -> Decimal {
        self.total_equity + self.settled_pairs * PAYOUT
    }

    /// Check the invariants every published portfolio must hold.
    /// `previous` is the last valid portfolio, for monotonicity.
    pub fn validate(&self, previous: &Portfolio) -> Result<(), StrikeArbError> {
        if self.cash_balance < Decimal::ZERO {
            return Err(StrikeArbError::InvariantViolation(format!(
                "cash balance negative ({})",
                self.cash_balance
            )));
        }
        for side in [Side::Yes, Side::No] {
            let pos = self.position(side);
            if pos.qty < Decimal::ZERO {
                return Err(StrikeArbError::InvariantViolation(format!(
                    "{side} quantity negative ({})",
                    pos.qty
                )));
            }
            if pos.avg_cost < Decimal::ZERO || pos.avg_cost > PAYOUT {
                return Err(StrikeArbError::InvariantViolation(format!(
                    "{side} average cost out of range ({})",
                    pos.avg_cost
                )));
            }
            if pos.qty.is_zero() && !pos.avg_cost.is_zero() {
                return Err(StrikeArbError::InvariantViolation(format!(
                    "{side} flat with non-zero average cost ({})",
                    pos.avg_cost
                )));
            }
        }
        let new_fills = self
            .trade_history
            .get(previous.trade_history.len()..)
            .unwrap_or(&[]);
        for trade in new_fills {
            if trade.price <= Decimal::ZERO || trade.price > PAYOUT {
                return Err(StrikeArbError::InvariantViolation(format!(
                    "fill price out of range ({} for {})",
                    trade.price, trade.leg
                )));
            }
        }
        if self.locked_profit < previous.locked_profit {
            return Err(StrikeArbError::InvariantViolation(format!(
                "locked profit decreased ({} -> {})",
                previous.locked_profit, self.locked_profit
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Marks
// ---------------------------------------------------------------------------

/// Current asks per contract, for marking inventory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Marks(HashMap<LegRef, Decimal>);

impl Marks {
    pub fn from_quotes(quotes: &QuoteSnapshot) -> Self {
        let mut marks = HashMap::new();

        if let Some(poly) = &quotes.polymarket {
            if let Some(strike) = poly.price_to_beat.and_then(wire_decimal) {
                for (outcome, raw) in [(Outcome::Up, poly.prices.up), (Outcome::Down, poly.prices.down)] {
                    if let Ok(price) = poly_ask(raw) {
                        marks.insert(LegRef { venue: Venue::Polymarket, outcome, strike }, price);
                    }
                }
            }
        }

        if let Some(kalshi) = &quotes.kalshi {
            for rung in &kalshi.markets {
                let Some(strike) = rung.strike.and_then(wire_decimal) else {
                    continue;
                };
                for (outcome, raw) in [(Outcome::Yes, rung.yes_ask), (Outcome::No, rung.no_ask)] {
                    if let Ok(price) = kalshi_ask(raw) {
                        marks.insert(LegRef { venue: Venue::Kalshi, outcome, strike }, price);
                    }
                }
            }
        }

        Self(marks)
    }

    pub fn get(&self, leg: &LegRef) -> Option<Decimal> {
        self.0.get(leg).copied()
    }

    /// Mark for a position: the current ask of its last leg, falling back
    /// to its average cost when that contract is no longer quoted.
    pub fn for_position(&self, position: &Position) -> Decimal {
        position
            .last_leg
            .and_then(|leg| self.get(&leg))
            .unwrap_or(position.avg_cost)
    }
}

// ---------------------------------------------------------------------------
// Tick outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    NoAction { reason: String },
    Buy { check: Check, size: Decimal },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub matched: Decimal,
    pub pair_cost: Decimal,
    pub realized: Decimal,
}

/// Result of one simulator tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub portfolio: Portfolio,
    pub fills: Vec<Trade>,
    pub settlement: Option<Settlement>,
    pub diagnostics: Vec<String>,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct PortfolioSimulator {
    config: SimulatorConfig,
}

impl PortfolioSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// A fresh zero-inventory portfolio at the configured capital.
    pub fn reset(&self) -> Portfolio {
        let mut portfolio = Portfolio::new(self.config.initial_capital);
        portfolio.last_action = "Simulation reset".to_string();
        portfolio
    }

    /// Phase 1: pick a fill size for the best opportunity, or explain why not.
    pub fn decide(&self, portfolio: &Portfolio, best: Option<&Check>) -> Decision {
        let Some(check) = best else {
            return Decision::NoAction {
                reason: "no arbitrage opportunity".to_string(),
            };
        };

        if !check.is_arbitrage || check.total_cost <= Decimal::ZERO {
            return Decision::NoAction {
                reason: format!("opportunity not tradable (total cost {})", check.total_cost),
            };
        }

        if portfolio.cash_balance < self.config.min_cash {
            return Decision::NoAction {
                reason: format!(
                    "cash ${:.2} below minimum ${:.2}",
                    portfolio.cash_balance, self.config.min_cash
                ),
            };
        }

        let affordable = portfolio
            .cash_balance
            .checked_div(check.total_cost)
            .map(|q| q.floor())
            .unwrap_or(Decimal::ZERO);
        let size = self.config.trade_size.min(affordable);

        if size <= Decimal::ZERO || size < self.config.min_trade_size {
            return Decision::NoAction {
                reason: format!(
                    "insufficient cash for minimum trade (${:.2} available, ${:.3} per pair)",
                    portfolio.cash_balance, check.total_cost
                ),
            };
        }

        Decision::Buy {
            check: check.clone(),
            size,
        }
    }

    /// Phase 2: buy `size` of both legs, YES leg first.
    pub fn apply_fills(
        portfolio: &mut Portfolio,
        check: &Check,
        size: Decimal,
        tick: u64,
    ) -> Vec<Trade> {
        let mut fills = Vec::with_capacity(2);
        for side in [Side::Yes, Side::No] {
            let leg = check.leg(side);
            portfolio.cash_balance -= size * leg.price;
            portfolio.position_mut(side).fill(size, leg.price, leg.contract);

            let trade = Trade {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                tick,
                side,
                leg: leg.contract,
                price: leg.price,
                size,
            };
            debug!(trade = %trade, "Simulated fill");
            Arc::make_mut(&mut portfolio.trade_history).push(trade.clone());
            fills.push(trade);
        }
        fills
    }

    /// Phase 3: move matched YES/NO quantity into locked profit.
    ///
    /// Runs at most once per tick. A pair whose average cost exceeds the
    /// payout is left in inventory so locked profit never decreases.
    pub fn settle(portfolio: &mut Portfolio, tick: u64) -> Option<Settlement> {
        if portfolio.last_settled_tick == Some(tick) {
            return None;
        }
        portfolio.last_settled_tick = Some(tick);

        let matched = portfolio.matched_qty();
        if matched <= Decimal::ZERO {
            return None;
        }

        let pair_cost = portfolio.pair_cost();
        if pair_cost > PAYOUT {
            warn!(
                matched = %matched,
                pair_cost = %pair_cost,
                "Matched pair costs more than payout, not settling"
            );
            return None;
        }

        let realized = matched * (PAYOUT - pair_cost);
        portfolio.locked_profit += realized;
        portfolio.settled_pairs += matched;
        portfolio.yes.reduce(matched);
        portfolio.no.reduce(matched);

        Some(Settlement {
            matched,
            pair_cost,
            realized,
        })
    }

    /// Phase 4: recompute equity from cash and marked inventory.
    pub fn mark(portfolio: &mut Portfolio, marks: &Marks) {
        portfolio.total_equity = portfolio.cash_balance
            + portfolio.yes.qty * marks.for_position(&portfolio.yes)
            + portfolio.no.qty * marks.for_position(&portfolio.no);
    }

    /// Run one full tick against `current`, returning the portfolio to
    /// publish. On an invariant violation the returned portfolio is
    /// `current` unchanged apart from `tick` and `last_action`.
    pub fn on_tick(
        &self,
        current: &Portfolio,
        tick: u64,
        best: Option<&Check>,
        marks: &Marks,
    ) -> TickReport {
        let mut next = current.clone();
        next.tick = tick;

        let mut fills = Vec::new();
        let action = match self.decide(&next, best) {
            Decision::NoAction { reason } => {
                debug!(tick, reason = %reason, "No trade");
                format!("No action: {reason}")
            }
            Decision::Buy { check, size } => {
                fills = Self::apply_fills(&mut next, &check, size, tick);
                let yes = check.leg(Side::Yes);
                let no = check.leg(Side::No);
                info!(
                    tick,
                    size = %size,
                    yes_leg = %yes.contract,
                    yes_price = %yes.price,
                    no_leg = %no.contract,
                    no_price = %no.price,
                    margin = %check.margin,
                    cash = format!("${:.2}", next.cash_balance),
                    "Bought hedge pair"
                );
                format!(
                    "Bought {size} pairs: YES {} @ {:.3} + NO {} @ {:.3} (margin {:.3})",
                    yes.contract, yes.price, no.contract, no.price, check.margin
                )
            }
        };

        let settlement = Self::settle(&mut next, tick);
        next.last_action = match &settlement {
            Some(s) => {
                info!(
                    tick,
                    matched = %s.matched,
                    pair_cost = %s.pair_cost,
                    realized = format!("${:.4}", s.realized),
                    locked_profit = format!("${:.4}", next.locked_profit),
                    "Pair complete, profit locked"
                );
                format!("{action}; locked ${:.2} on {} pairs", s.realized, s.matched)
            }
            None => action,
        };

        Self::mark(&mut next, marks);

        match next.validate(current) {
            Ok(()) => TickReport {
                portfolio: next,
                fills,
                settlement,
                diagnostics: Vec::new(),
            },
            Err(e) => {
                error!(tick, error = %e, "Rejecting tick, keeping previous portfolio");
                let mut kept = current.clone();
                kept.tick = tick;
                kept.last_action = format!("Rejected: {e}");
                TickReport {
                    portfolio: kept,
                    fills: Vec::new(),
                    settlement: None,
                    diagnostics: vec![e.to_string()],
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
