//! Shared types for the STRIKEARB engine.
//!
//! Wire-level quote structs (as delivered by the quote collaborators),
//! plus the derived leg/pairing/check vocabulary used by the matcher,
//! scanner and simulator.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Guaranteed payout of one fully hedged pair, in dollars.
pub const PAYOUT: Decimal = dec!(1);

// ---------------------------------------------------------------------------
// Venue quotes (wire format)
// ---------------------------------------------------------------------------

/// Venue A: a single continuous binary market ("Up"/"Down") against one
/// reference threshold.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolymarketQuote {
    /// Reference threshold the underlying has to beat.
    pub price_to_beat: Option<f64>,
    pub current_price: Option<f64>,
    #[serde(default)]
    pub prices: OutcomePrices,
    #[serde(default)]
    pub slug: String,
}

/// Ask prices (dollars, 0.0–1.0) for the two complementary outcomes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutcomePrices {
    #[serde(rename = "Up")]
    pub up: Option<f64>,
    #[serde(rename = "Down")]
    pub down: Option<f64>,
}

/// Venue B: a ladder of strike levels for the same event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KalshiQuote {
    #[serde(default)]
    pub event_ticker: String,
    pub current_price: Option<f64>,
    #[serde(default)]
    pub markets: Vec<KalshiStrike>,
}

/// One rung of the venue-B ladder. Asks are whole cents (0–100).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KalshiStrike {
    pub strike: Option<f64>,
    pub yes_ask: Option<f64>,
    pub no_ask: Option<f64>,
    #[serde(default)]
    pub subtitle: String,
}

/// Both venues' quotes for one tick, as handed over by a quote source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteSnapshot {
    #[serde(default)]
    pub polymarket: Option<PolymarketQuote>,
    #[serde(default)]
    pub kalshi: Option<KalshiQuote>,
    /// Collaborator-side fetch errors, passed through to diagnostics.
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl QuoteSnapshot {
    pub fn new(polymarket: Option<PolymarketQuote>, kalshi: Option<KalshiQuote>) -> Self {
        Self {
            polymarket,
            kalshi,
            errors: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    /// A snapshot carrying only an error (the source could not deliver).
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            polymarket: None,
            kalshi: None,
            errors: vec![error.into()],
            fetched_at: Utc::now(),
        }
    }
}

impl Default for QuoteSnapshot {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Polymarket,
    Kalshi,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Polymarket => write!(f, "Poly"),
            Venue::Kalshi => write!(f, "Kalshi"),
        }
    }
}

/// A contract outcome on either venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Up,
    Down,
    Yes,
    No,
}

impl Outcome {
    /// Whether this outcome pays when the underlying finishes at or above
    /// its strike.
    pub fn is_bullish(&self) -> bool {
        matches!(self, Outcome::Up | Outcome::Yes)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Up => write!(f, "Up"),
            Outcome::Down => write!(f, "Down"),
            Outcome::Yes => write!(f, "Yes"),
            Outcome::No => write!(f, "No"),
        }
    }
}

/// Portfolio side. The bullish leg of a hedge is booked as YES, the
/// bearish leg as NO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn of(outcome: Outcome) -> Self {
        if outcome.is_bullish() {
            Side::Yes
        } else {
            Side::No
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// How the venue-A threshold compares to a venue-B strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrikeRelation {
    #[serde(rename = "Poly > Kalshi")]
    PolyAbove,
    #[serde(rename = "Poly < Kalshi")]
    PolyBelow,
    #[serde(rename = "Equal")]
    Equal,
}

impl StrikeRelation {
    pub fn between(price_to_beat: Decimal, kalshi_strike: Decimal) -> Self {
        match price_to_beat.cmp(&kalshi_strike) {
            std::cmp::Ordering::Greater => StrikeRelation::PolyAbove,
            std::cmp::Ordering::Less => StrikeRelation::PolyBelow,
            std::cmp::Ordering::Equal => StrikeRelation::Equal,
        }
    }
}

impl fmt::Display for StrikeRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrikeRelation::PolyAbove => write!(f, "Poly > Kalshi"),
            StrikeRelation::PolyBelow => write!(f, "Poly < Kalshi"),
            StrikeRelation::Equal => write!(f, "Equal"),
        }
    }
}

/// One of the four logical venue-A × venue-B outcome combinations.
///
/// Only `UpNo` and `DownYes` pair opposite directions; the other two
/// lose together on half the outcome space and are never hedges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pairing {
    UpYes,
    UpNo,
    DownYes,
    DownNo,
}

impl Pairing {
    pub const ALL: [Pairing; 4] = [
        Pairing::UpYes,
        Pairing::UpNo,
        Pairing::DownYes,
        Pairing::DownNo,
    ];

    pub fn poly_outcome(&self) -> Outcome {
        match self {
            Pairing::UpYes | Pairing::UpNo => Outcome::Up,
            Pairing::DownYes | Pairing::DownNo => Outcome::Down,
        }
    }

    pub fn kalshi_outcome(&self) -> Outcome {
        match self {
            Pairing::UpYes | Pairing::DownYes => Outcome::Yes,
            Pairing::UpNo | Pairing::DownNo => Outcome::No,
        }
    }

    pub fn is_opposing(&self) -> bool {
        matches!(self, Pairing::UpNo | Pairing::DownYes)
    }

    /// Whether at least one leg pays in every outcome, given how the two
    /// strikes relate.
    ///
    /// `DownYes` leaves a gap when the venue-B strike sits above the
    /// threshold; `UpNo` leaves one when it sits below.
    pub fn hedges(&self, relation: StrikeRelation) -> bool {
        match (self, relation) {
            (Pairing::DownYes, StrikeRelation::PolyAbove | StrikeRelation::Equal) => true,
            (Pairing::UpNo, StrikeRelation::PolyBelow | StrikeRelation::Equal) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Poly {} + Kalshi {}", self.poly_outcome(), self.kalshi_outcome())
    }
}

// ---------------------------------------------------------------------------
// Legs and checks
// ---------------------------------------------------------------------------

/// Identifies a tradable contract side: venue, outcome and strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegRef {
    pub venue: Venue,
    pub outcome: Outcome,
    pub strike: Decimal,
}

impl fmt::Display for LegRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ {}", self.venue, self.outcome, self.strike)
    }
}

/// A leg with its current ask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(flatten)]
    pub contract: LegRef,
    pub price: Decimal,
}

impl Leg {
    pub fn side(&self) -> Side {
        Side::of(self.contract.outcome)
    }
}

/// A priced candidate pairing of one leg per venue at a matched strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub kalshi_strike: Decimal,
    pub kalshi_subtitle: String,
    pub kalshi_yes: Option<Decimal>,
    pub kalshi_no: Option<Decimal>,
    pub poly_strike: Decimal,
    #[serde(rename = "type")]
    pub relation: StrikeRelation,
    pub pairing: Pairing,
    pub poly_leg: Outcome,
    pub kalshi_leg: Outcome,
    pub poly_cost: Decimal,
    pub kalshi_cost: Decimal,
    pub total_cost: Decimal,
    pub is_arbitrage: bool,
    /// `1 - total_cost` when arbitrage, zero otherwise.
    pub margin: Decimal,
}

impl Check {
    pub fn poly(&self) -> Leg {
        Leg {
            contract: LegRef {
                venue: Venue::Polymarket,
                outcome: self.poly_leg,
                strike: self.poly_strike,
            },
            price: self.poly_cost,
        }
    }

    pub fn kalshi(&self) -> Leg {
        Leg {
            contract: LegRef {
                venue: Venue::Kalshi,
                outcome: self.kalshi_leg,
                strike: self.kalshi_strike,
            },
            price: self.kalshi_cost,
        }
    }

    /// The leg booked on the given portfolio side.
    pub fn leg(&self, side: Side) -> Leg {
        let poly = self.poly();
        if poly.side() == side {
            poly
        } else {
            self.kalshi()
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @ {} | {:.3} + {:.3} = {:.3}{}",
            self.relation,
            self.pairing,
            self.kalshi_strike,
            self.poly_cost,
            self.kalshi_cost,
            self.total_cost,
            if self.is_arbitrage {
                format!(" | ARB margin {:.3}", self.margin)
            } else {
                String::new()
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// One simulated fill, appended to the portfolio history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tick: u64,
    pub side: Side,
    pub leg: LegRef,
    pub price: Decimal,
    pub size: Decimal,
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} x{} @ {:.3} ({})",
            self.tick,
            self.side,
            self.leg,
            self.size,
            self.price,
            self.timestamp.format("%H:%M:%S"),
        )
    }
}

// ---------------------------------------------------------------------------
// Wire conversion
// ---------------------------------------------------------------------------

/// Convert a wire float to an exact decimal. `None` for NaN or infinities.
pub fn wire_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for STRIKEARB.
#[derive(Debug, thiserror::Error)]
pub enum StrikeArbError {
    #[error("Quote feed error ({source_name}): {message}")]
    Feed { source_name: String, message: String },

    #[error("Portfolio invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_display() {
        assert_eq!(format!("{}", Side::Yes), "YES");
        assert_eq!(format!("{}", Side::No), "NO");
    }

    #[test]
    fn test_side_of_outcome() {
        assert_eq!(Side::of(Outcome::Up), Side::Yes);
        assert_eq!(Side::of(Outcome::Yes), Side::Yes);
        assert_eq!(Side::of(Outcome::Down), Side::No);
        assert_eq!(Side::of(Outcome::No), Side::No);
    }

    #[test]
    fn test_only_opposing_pairings_hedge() {
        for relation in [
            StrikeRelation::PolyAbove,
            StrikeRelation::PolyBelow,
            StrikeRelation::Equal,
        ] {
            assert!(!Pairing::UpYes.hedges(relation));
            assert!(!Pairing::DownNo.hedges(relation));
        }
        assert!(Pairing::DownYes.hedges(StrikeRelation::PolyAbove));
        assert!(!Pairing::DownYes.hedges(StrikeRelation::PolyBelow));
        assert!(Pairing::UpNo.hedges(StrikeRelation::PolyBelow));
        assert!(!Pairing::UpNo.hedges(StrikeRelation::PolyAbove));
        assert!(Pairing::UpNo.hedges(StrikeRelation::Equal));
        assert!(Pairing::DownYes.hedges(StrikeRelation::Equal));
    }

    #[test]
    fn test_pairing_outcomes() {
        assert_eq!(Pairing::UpNo.poly_outcome(), Outcome::Up);
        assert_eq!(Pairing::UpNo.kalshi_outcome(), Outcome::No);
        assert_eq!(Pairing::DownYes.poly_outcome(), Outcome::Down);
        assert_eq!(Pairing::DownYes.kalshi_outcome(), Outcome::Yes);
        assert_eq!(format!("{}", Pairing::DownYes), "Poly Down + Kalshi Yes");
    }

    #[test]
    fn test_strike_relation() {
        assert_eq!(StrikeRelation::between(dec!(100), dec!(90)), StrikeRelation::PolyAbove);
        assert_eq!(StrikeRelation::between(dec!(100), dec!(110)), StrikeRelation::PolyBelow);
        assert_eq!(StrikeRelation::between(dec!(100), dec!(100)), StrikeRelation::Equal);
        assert_eq!(
            serde_json::to_string(&StrikeRelation::PolyAbove).unwrap(),
            "\"Poly > Kalshi\""
        );
    }

    #[test]
    fn test_check_leg_by_side() {
        let check = Check {
            kalshi_strike: dec!(100000),
            kalshi_subtitle: "$100,000 or above".into(),
            kalshi_yes: Some(dec!(0.40)),
            kalshi_no: Some(dec!(0.55)),
            poly_strike: dec!(100000),
            relation: StrikeRelation::Equal,
            pairing: Pairing::DownYes,
            poly_leg: Outcome::Down,
            kalshi_leg: Outcome::Yes,
            poly_cost: dec!(0.49),
            kalshi_cost: dec!(0.40),
            total_cost: dec!(0.89),
            is_arbitrage: true,
            margin: dec!(0.11),
        };
        assert_eq!(check.leg(Side::Yes).contract.venue, Venue::Kalshi);
        assert_eq!(check.leg(Side::Yes).price, dec!(0.40));
        assert_eq!(check.leg(Side::No).contract.outcome, Outcome::Down);
        assert_eq!(check.leg(Side::No).price, dec!(0.49));
    }

    #[test]
    fn test_quote_snapshot_parses_wire_format() {
        let json = r#"{
            "polymarket": {
                "price_to_beat": 100000.0,
                "current_price": 100500.0,
                "prices": {"Up": 0.52, "Down": 0.49},
                "slug": "bitcoin-up-or-down-december-12-9pm-et"
            },
            "kalshi": {
                "event_ticker": "KXBTCD-25DEC1221",
                "current_price": 100480.0,
                "markets": [
                    {"strike": 100000, "yes_ask": 40, "no_ask": 55, "subtitle": "$100,000 or above"}
                ]
            }
        }"#;
        let snap: QuoteSnapshot = serde_json::from_str(json).unwrap();
        let poly = snap.polymarket.unwrap();
        assert_eq!(poly.prices.up, Some(0.52));
        assert_eq!(snap.kalshi.unwrap().markets[0].yes_ask, Some(40.0));
        assert!(snap.errors.is_empty());
    }

    #[test]
    fn test_missing_price_fields_are_none() {
        let json = r#"{"polymarket": {"prices": {"Up": 0.5}}}"#;
        let snap: QuoteSnapshot = serde_json::from_str(json).unwrap();
        let poly = snap.polymarket.unwrap();
        assert!(poly.price_to_beat.is_none());
        assert!(poly.prices.down.is_none());
        assert!(snap.kalshi.is_none());
    }

    #[test]
    fn test_failed_snapshot() {
        let snap = QuoteSnapshot::failed("Event not found");
        assert!(snap.polymarket.is_none());
        assert_eq!(snap.errors, vec!["Event not found".to_string()]);
    }
}
