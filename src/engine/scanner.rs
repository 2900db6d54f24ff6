//! Arbitrage scanner.
//!
//! Prices every hedge candidate produced by the matcher, flags the ones
//! whose combined ask is below the $1.00 payout and ranks them by margin.
//! Bad quote fields never fail a scan: the affected legs are dropped and a
//! diagnostic string explains why.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cmp::Ordering;
use tracing::{debug, info};

use crate::engine::matcher::{match_legs, CandidatePair, MatcherConfig};
use crate::types::{wire_decimal, Check, Outcome, QuoteSnapshot, PAYOUT};

/// Venue-B asks are quoted in cents.
const CENTS: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Scan result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub price_to_beat: Option<Decimal>,
    /// Every priced candidate, ordered by strike then pairing.
    pub checks: Vec<Check>,
    /// Arbitrage checks, best first.
    pub opportunities: Vec<Check>,
    pub diagnostics: Vec<String>,
}

impl ScanResult {
    /// The highest-margin opportunity, if any.
    pub fn best(&self) -> Option<&Check> {
        self.opportunities.first()
    }
}

// ---------------------------------------------------------------------------
// Pricing helpers
// ---------------------------------------------------------------------------

/// Normalise a wire ask to dollars. `scale` is 1 for dollar quotes and 100
/// for cent quotes.
///
/// A zero ask means the book has no sellers, so it is treated as missing
/// rather than as a free leg.
pub fn ask_price(raw: Option<f64>, scale: Decimal) -> Result<Decimal, String> {
    let raw = raw.ok_or_else(|| "missing".to_string())?;
    let value = wire_decimal(raw).ok_or_else(|| format!("non-finite ({raw})"))?;
    if value.is_zero() {
        return Err("no liquidity (zero ask)".to_string());
    }
    if value.is_sign_negative() || value > scale {
        return Err(format!("out of range ({raw})"));
    }
    Ok(value / scale)
}

pub fn poly_ask(raw: Option<f64>) -> Result<Decimal, String> {
    ask_price(raw, Decimal::ONE)
}

pub fn kalshi_ask(raw_cents: Option<f64>) -> Result<Decimal, String> {
    ask_price(raw_cents, CENTS)
}

/// Venue-A ask for one outcome, or `None` with the reason pushed onto
/// `diagnostics`.
fn poly_leg_ask(raw: Option<f64>, outcome: Outcome, diagnostics: &mut Vec<String>) -> Option<Decimal> {
    match poly_ask(raw) {
        Ok(cost) => Some(cost),
        Err(reason) => {
            diagnostics.push(format!("Polymarket {outcome} ask {reason}"));
            None
        }
    }
}

/// Build a check from two leg costs. `total_cost` is the exact sum and
/// the arbitrage flag is strictly `total_cost < 1`.
pub fn price_check(
    candidate: &CandidatePair<'_>,
    price_to_beat: Decimal,
    poly_cost: Decimal,
    kalshi_cost: Decimal,
) -> Check {
    let total_cost = poly_cost + kalshi_cost;
    let is_arbitrage = total_cost < PAYOUT;
    let margin = if is_arbitrage {
        PAYOUT - total_cost
    } else {
        Decimal::ZERO
    };

    Check {
        kalshi_strike: candidate.strike,
        kalshi_subtitle: candidate.rung.subtitle.clone(),
        kalshi_yes: kalshi_ask(candidate.rung.yes_ask).ok(),
        kalshi_no: kalshi_ask(candidate.rung.no_ask).ok(),
        poly_strike: price_to_beat,
        relation: candidate.relation,
        pairing: candidate.pairing,
        poly_leg: candidate.pairing.poly_outcome(),
        kalshi_leg: candidate.pairing.kalshi_outcome(),
        poly_cost,
        kalshi_cost,
        total_cost,
        is_arbitrage,
        margin,
    }
}

/// Opportunity ranking: margin descending, then total cost ascending,
/// then strike ascending, then pairing.
pub fn rank(a: &Check, b: &Check) -> Ordering {
    b.margin
        .cmp(&a.margin)
        .then_with(|| a.total_cost.cmp(&b.total_cost))
        .then_with(|| a.kalshi_strike.cmp(&b.kalshi_strike))
        .then_with(|| a.pairing.cmp(&b.pairing))
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Scan one tick's quotes for cross-venue arbitrage.
pub fn scan(quotes: &QuoteSnapshot, config: &MatcherConfig) -> ScanResult {
    let mut result = ScanResult::default();

    let (Some(poly), Some(kalshi)) = (&quotes.polymarket, &quotes.kalshi) else {
        if quotes.polymarket.is_none() {
            result.diagnostics.push("Polymarket quote unavailable".to_string());
        }
        if quotes.kalshi.is_none() {
            result.diagnostics.push("Kalshi quote unavailable".to_string());
        }
        return result;
    };

    let Some(price_to_beat) = poly.price_to_beat.and_then(wire_decimal) else {
        result.diagnostics.push(format!(
            "Polymarket strike unusable for {} ({:?})",
            poly.slug, poly.price_to_beat
        ));
        return result;
    };
    result.price_to_beat = Some(price_to_beat);

    let up = poly_leg_ask(poly.prices.up, Outcome::Up, &mut result.diagnostics);
    let down = poly_leg_ask(poly.prices.down, Outcome::Down, &mut result.diagnostics);

    let matched = match_legs(price_to_beat, kalshi, config);
    result.diagnostics.extend(matched.diagnostics.iter().cloned());

    for candidate in &matched.candidates {
        let poly_cost = match candidate.pairing.poly_outcome() {
            Outcome::Up => up,
            _ => down,
        };
        let kalshi_outcome = candidate.pairing.kalshi_outcome();
        let kalshi_raw = match kalshi_outcome {
            Outcome::Yes => candidate.rung.yes_ask,
            _ => candidate.rung.no_ask,
        };
        let kalshi_cost = match kalshi_ask(kalshi_raw) {
            Ok(cost) => cost,
            Err(reason) => {
                result.diagnostics.push(format!(
                    "Kalshi {} {} ask {reason}",
                    candidate.strike, kalshi_outcome
                ));
                continue;
            }
        };
        // The venue-A leg problem is already diagnosed once above.
        let Some(poly_cost) = poly_cost else {
            continue;
        };

        let check = price_check(candidate, price_to_beat, poly_cost, kalshi_cost);
        debug!(check = %check, "Checked pairing");
        result.checks.push(check);
    }

    result.opportunities = result
        .checks
        .iter()
        .filter(|c| c.is_arbitrage)
        .cloned()
        .collect();
    result.opportunities.sort_by(rank);

    if let Some(best) = result.best() {
        info!(
            opportunities = result.opportunities.len(),
            best = %best,
            "Arbitrage found"
        );
    } else {
        debug!(checks = result.checks.len(), "No risk-free arbitrage found");
    }

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KalshiQuote, KalshiStrike, OutcomePrices, Pairing, PolymarketQuote, StrikeRelation};

    fn poly(up: f64, down: f64) -> PolymarketQuote {
        PolymarketQuote {
            price_to_beat: Some(100_000.0),
            current_price: Some(100_500.0),
            prices: OutcomePrices {
                up: Some(up),
                down: Some(down),
            },
            slug: "bitcoin-up-or-down-test".into(),
        }
    }

    fn kalshi(rungs: &[(f64, f64, f64)]) -> KalshiQuote {
        KalshiQuote {
            event_ticker: "KXBTCD-TEST".into(),
            current_price: Some(100_480.0),
            markets: rungs
                .iter()
                .map(|(strike, yes, no)| KalshiStrike {
                    strike: Some(*strike),
                    yes_ask: Some(*yes),
                    no_ask: Some(*no),
                    subtitle: format!("${strike} or above"),
                })
                .collect(),
        }
    }

    fn snapshot(p: PolymarketQuote, k: KalshiQuote) -> QuoteSnapshot {
        QuoteSnapshot::new(Some(p), Some(k))
    }

    #[test]
    fn test_worked_example_equal_strike() {
        let quotes = snapshot(poly(0.52, 0.49), kalshi(&[(100_000.0, 40.0, 55.0)]));
        let result = scan(&quotes, &MatcherConfig::default());

        assert_eq!(result.checks.len(), 2);
        let up_no = result.checks.iter().find(|c| c.pairing == Pairing::UpNo).unwrap();
        assert_eq!(up_no.total_cost, dec!(1.07));
        assert!(!up_no.is_arbitrage);
        assert_eq!(up_no.margin, Decimal::ZERO);

        let down_yes = result.checks.iter().find(|c| c.pairing == Pairing::DownYes).unwrap();
        assert_eq!(down_yes.poly_cost, dec!(0.49));
        assert_eq!(down_yes.kalshi_cost, dec!(0.40));
        assert_eq!(down_yes.total_cost, dec!(0.89));
        assert!(down_yes.is_arbitrage);
        assert_eq!(down_yes.margin, dec!(0.11));
        assert_eq!(down_yes.relation, StrikeRelation::Equal);

        let best = result.best().unwrap();
        assert_eq!(best.pairing, Pairing::DownYes);
        assert_eq!(result.opportunities.len(), 1);
    }

    #[test]
    fn test_total_cost_is_exact_sum_and_flag_matches() {
        let quotes = snapshot(
            poly(0.37, 0.61),
            kalshi(&[
                (98_000.0, 63.0, 38.0),
                (99_000.0, 51.0, 50.0),
                (100_000.0, 39.0, 62.0),
                (101_000.0, 30.0, 71.0),
                (102_000.0, 20.0, 82.0),
            ]),
        );
        let result = scan(&quotes, &MatcherConfig::default());
        assert!(!result.checks.is_empty());
        for check in &result.checks {
            assert_eq!(check.total_cost, check.poly_cost + check.kalshi_cost);
            assert_eq!(check.is_arbitrage, check.total_cost < dec!(1));
            if check.is_arbitrage {
                assert_eq!(check.margin, dec!(1) - check.total_cost);
            } else {
                assert_eq!(check.margin, Decimal::ZERO);
            }
        }
    }

    #[test]
    fn test_cost_exactly_one_is_not_arbitrage() {
        let quotes = snapshot(poly(0.50, 0.50), kalshi(&[(99_000.0, 50.0, 50.0)]));
        let result = scan(&quotes, &MatcherConfig::default());
        assert_eq!(result.checks.len(), 1);
        assert_eq!(result.checks[0].total_cost, dec!(1));
        assert!(!result.checks[0].is_arbitrage);
        assert!(result.opportunities.is_empty());
    }

    #[test]
    fn test_opportunities_ranked_with_tie_breaks() {
        // 99k DownYes: 0.45 + 0.45 = 0.90
        // 99.5k DownYes: 0.45 + 0.45 = 0.90 (tie, higher strike)
        // 100.5k UpNo: 0.40 + 0.52 = 0.92
        // 101k UpNo: 0.40 + 0.45 = 0.85 (best)
        let quotes = snapshot(
            poly(0.40, 0.45),
            kalshi(&[
                (99_000.0, 45.0, 60.0),
                (99_500.0, 45.0, 60.0),
                (100_500.0, 60.0, 52.0),
                (101_000.0, 60.0, 45.0),
            ]),
        );
        let result = scan(&quotes, &MatcherConfig::default());
        let order: Vec<_> = result
            .opportunities
            .iter()
            .map(|c| (c.kalshi_strike, c.margin))
            .collect();
        assert_eq!(
            order,
            vec![
                (dec!(101000), dec!(0.15)),
                (dec!(99000), dec!(0.10)),
                (dec!(99500), dec!(0.10)),
                (dec!(100500), dec!(0.08)),
            ]
        );
        for pair in result.opportunities.windows(2) {
            assert_ne!(rank(&pair[0], &pair[1]), Ordering::Greater);
        }
        assert!(result.opportunities.iter().all(|o| result.checks.contains(o)));
    }

    #[test]
    fn test_checks_ordered_by_strike() {
        let quotes = snapshot(
            poly(0.5, 0.5),
            kalshi(&[(100_500.0, 50.0, 50.0), (99_500.0, 50.0, 50.0)]),
        );
        let result = scan(&quotes, &MatcherConfig::default());
        let strikes: Vec<_> = result.checks.iter().map(|c| c.kalshi_strike).collect();
        assert_eq!(strikes, vec![dec!(99500), dec!(100500)]);
    }

    #[test]
    fn test_missing_poly_price_excludes_its_legs() {
        let mut p = poly(0.52, 0.49);
        p.prices.down = None;
        let quotes = snapshot(p, kalshi(&[(100_000.0, 40.0, 55.0), (99_000.0, 30.0, 72.0)]));
        let result = scan(&quotes, &MatcherConfig::default());

        assert!(result.checks.iter().all(|c| c.poly_leg == Outcome::Up));
        assert!(result.opportunities.is_empty());
        assert_eq!(
            result.diagnostics,
            vec!["Polymarket Down ask missing".to_string()]
        );
    }

    #[test]
    fn test_non_finite_and_zero_asks_are_diagnosed() {
        let mut p = poly(f64::NAN, 0.49);
        p.prices.up = Some(f64::INFINITY);
        let mut k = kalshi(&[(100_000.0, 0.0, 55.0)]);
        k.markets[0].no_ask = Some(f64::NAN);
        let result = scan(&snapshot(p, k), &MatcherConfig::default());

        assert!(result.checks.is_empty());
        assert!(result.opportunities.is_empty());
        assert_eq!(result.diagnostics.len(), 3);
        assert!(result.diagnostics.iter().any(|d| d.contains("Up ask non-finite")));
        assert!(result.diagnostics.iter().any(|d| d.contains("Yes ask no liquidity")));
        assert!(result.diagnostics.iter().any(|d| d.contains("No ask non-finite")));
    }

    #[test]
    fn test_both_poly_asks_missing_yields_no_checks() {
        let mut p = poly(0.52, 0.49);
        p.prices.up = None;
        p.prices.down = Some(0.0);
        let result = scan(&snapshot(p, kalshi(&[(100_000.0, 40.0, 55.0)])), &MatcherConfig::default());

        assert!(result.checks.is_empty());
        assert_eq!(
            result.diagnostics,
            vec![
                "Polymarket Up ask missing".to_string(),
                "Polymarket Down ask no liquidity (zero ask)".to_string(),
            ]
        );
    }

    #[test]
    fn test_extreme_strikes_do_not_fail_the_scan() {
        let mut p = poly(0.52, 0.49);
        p.price_to_beat = Some(5e28);
        let quotes = snapshot(p, kalshi(&[(-5e28, 40.0, 55.0)]));
        let result = scan(&quotes, &MatcherConfig::default());

        assert!(result.checks.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].contains("strike distance overflows"));
    }

    #[test]
    fn test_out_of_range_cents() {
        let result = scan(
            &snapshot(poly(0.5, 0.3), kalshi(&[(99_000.0, 140.0, 10.0)])),
            &MatcherConfig::default(),
        );
        assert!(result.checks.is_empty());
        assert!(result.diagnostics[0].contains("out of range"));
    }

    #[test]
    fn test_missing_venue_is_diagnosed() {
        let quotes = QuoteSnapshot::new(Some(poly(0.5, 0.5)), None);
        let result = scan(&quotes, &MatcherConfig::default());
        assert!(result.checks.is_empty());
        assert_eq!(result.diagnostics, vec!["Kalshi quote unavailable".to_string()]);
        assert!(result.price_to_beat.is_none());
    }

    #[test]
    fn test_missing_strike_is_diagnosed() {
        let mut p = poly(0.5, 0.5);
        p.price_to_beat = None;
        let result = scan(&snapshot(p, kalshi(&[(100_000.0, 40.0, 55.0)])), &MatcherConfig::default());
        assert!(result.checks.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].contains("strike unusable"));
    }

    #[test]
    fn test_kalshi_cents_converted() {
        assert_eq!(kalshi_ask(Some(40.0)).unwrap(), dec!(0.40));
        assert_eq!(kalshi_ask(Some(100.0)).unwrap(), dec!(1));
        assert!(kalshi_ask(Some(-1.0)).is_err());
        assert_eq!(poly_ask(Some(0.52)).unwrap(), dec!(0.52));
        assert!(poly_ask(Some(1.5)).is_err());
    }
}
