//! Cross-venue leg matcher.
//!
//! Selects the venue-B strikes that are economically comparable to the
//! venue-A threshold and enumerates the leg pairings that form a
//! risk-free hedge at each of them. Pure: no I/O, no state.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::types::{wire_decimal, KalshiQuote, KalshiStrike, Pairing, StrikeRelation};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default absolute distance from the threshold within which a venue-B
/// strike is considered comparable.
pub const DEFAULT_STRIKE_TOLERANCE: Decimal = dec!(2500);

/// Default number of strikes kept on each side of the closest one.
pub const DEFAULT_MAX_STRIKES_EACH_SIDE: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    pub strike_tolerance: Decimal,
    /// `None` keeps every strike inside the tolerance band.
    pub max_strikes_each_side: Option<usize>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            strike_tolerance: DEFAULT_STRIKE_TOLERANCE,
            max_strikes_each_side: Some(DEFAULT_MAX_STRIKES_EACH_SIDE),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A hedge pairing at one venue-B rung, not yet priced.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePair<'a> {
    pub strike: Decimal,
    pub relation: StrikeRelation,
    pub pairing: Pairing,
    pub rung: &'a KalshiStrike,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult<'a> {
    pub candidates: Vec<CandidatePair<'a>>,
    /// Strikes that survived the tolerance band and window, ascending.
    pub strikes: Vec<Decimal>,
    pub diagnostics: Vec<String>,
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Match venue-B rungs against the venue-A threshold.
///
/// Every one of the four logical pairings is considered per rung; only the
/// ones that hedge for that rung's strike relation are emitted, so equal
/// strikes yield both `UpNo` and `DownYes` while any other relation yields
/// exactly one.
pub fn match_legs<'a>(
    price_to_beat: Decimal,
    kalshi: &'a KalshiQuote,
    config: &MatcherConfig,
) -> MatchResult<'a> {
    let mut result = MatchResult::default();

    // (strike, distance from threshold, rung)
    let mut rungs: Vec<(Decimal, Decimal, &KalshiStrike)> =
        Vec::with_capacity(kalshi.markets.len());
    for rung in &kalshi.markets {
        let Some(strike) = rung.strike.and_then(wire_decimal) else {
            result.diagnostics.push(format!(
                "Kalshi market '{}' has no usable strike ({:?})",
                rung.subtitle, rung.strike
            ));
            continue;
        };
        match strike.checked_sub(price_to_beat) {
            Some(diff) if diff.abs() < config.strike_tolerance => {
                rungs.push((strike, diff.abs(), rung))
            }
            Some(_) => {}
            None => result.diagnostics.push(format!(
                "Kalshi market '{}' strike distance overflows ({strike} vs {price_to_beat})",
                rung.subtitle
            )),
        }
    }
    rungs.sort_by(|a, b| a.0.cmp(&b.0));

    let rungs = match config.max_strikes_each_side {
        Some(n) => window_around(rungs, n),
        None => rungs,
    };

    for (strike, _, rung) in rungs {
        let relation = StrikeRelation::between(price_to_beat, strike);
        for pairing in Pairing::ALL {
            if pairing.hedges(relation) {
                result.candidates.push(CandidatePair {
                    strike,
                    relation,
                    pairing,
                    rung,
                });
            }
        }
        result.strikes.push(strike);
    }

    debug!(
        event = %kalshi.event_ticker,
        ladder = kalshi.markets.len(),
        strikes = result.strikes.len(),
        candidates = result.candidates.len(),
        "Legs matched"
    );

    result
}

/// Keep at most `n` strikes below and `n` above the strike closest to the
/// threshold. Input must be sorted ascending by strike, with each entry
/// carrying its distance from the threshold.
fn window_around<T>(sorted: Vec<(Decimal, Decimal, T)>, n: usize) -> Vec<(Decimal, Decimal, T)> {
    let closest = sorted
        .iter()
        .enumerate()
        .min_by_key(|(_, (_, distance, _))| *distance)
        .map(|(i, _)| i);

    let Some(closest) = closest else {
        return sorted;
    };

    let start = closest.saturating_sub(n);
    let end = (closest + n + 1).min(sorted.len());
    sorted.into_iter().skip(start).take(end - start).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
