//! Quote sources.
//!
//! Defines the `QuoteSource` trait the engine pulls a combined two-venue
//! snapshot from once per tick, plus two offline implementations:
//! - [`FileQuoteSource`] re-reads a single JSON snapshot each tick
//! - [`ReplayQuoteSource`] cycles through a recorded session

pub mod file;
pub mod replay;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use crate::types::{QuoteSnapshot, StrikeArbError};

pub use file::FileQuoteSource;
pub use replay::ReplayQuoteSource;

/// Delivers the latest quotes for both venues.
///
/// Implementations may return a snapshot with one venue missing and the
/// reason in `errors`; only a total failure should be an `Err`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self) -> Result<QuoteSnapshot>;

    /// Source name for logging.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    File,
    Replay,
}

/// Build the configured source.
pub fn build_source(kind: FeedKind, path: impl Into<PathBuf>) -> Result<Box<dyn QuoteSource>> {
    let path = path.into();
    let source: Box<dyn QuoteSource> = match kind {
        FeedKind::File => Box::new(FileQuoteSource::new(path.clone())),
        FeedKind::Replay => Box::new(ReplayQuoteSource::from_path(&path)?),
    };
    info!(source = source.name(), path = %path.display(), "Quote source ready");
    Ok(source)
}

/// Parse one snapshot from JSON text, naming the source on failure.
pub(crate) fn parse_snapshot(source_name: &str, text: &str) -> Result<QuoteSnapshot> {
    serde_json::from_str(text).map_err(|e| {
        StrikeArbError::Feed {
            source_name: source_name.to_string(),
            message: format!("invalid snapshot JSON: {e}"),
        }
        .into()
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "polymarket": {
            "price_to_beat": 100000.0,
            "current_price": 100250.5,
            "prices": { "Up": 0.52, "Down": 0.49 },
            "slug": "bitcoin-up-or-down-test"
        },
        "kalshi": {
            "event_ticker": "KXBTCD-TEST",
            "current_price": 100240.0,
            "markets": [
                { "strike": 100000.0, "yes_ask": 40, "no_ask": 55, "subtitle": "$100,000 or above" }
            ]
        }
    }"#;

    #[test]
    fn test_parse_snapshot() {
        let snap = parse_snapshot("test", SNAPSHOT).unwrap();
        assert_eq!(snap.polymarket.unwrap().prices.up, Some(0.52));
        assert_eq!(snap.kalshi.unwrap().markets[0].yes_ask, Some(40.0));
        assert!(snap.errors.is_empty());
    }

    #[test]
    fn test_parse_snapshot_error_names_source() {
        let err = parse_snapshot("replay", "{ not json").unwrap_err();
        assert!(err.to_string().contains("replay"));
    }

    #[test]
    fn test_feed_kind_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: FeedKind,
        }
        let w: Wrapper = toml::from_str("kind = \"replay\"").unwrap();
        assert_eq!(w.kind, FeedKind::Replay);
        assert!(toml::from_str::<Wrapper>("kind = \"http\"").is_err());
    }

    #[tokio::test]
    async fn test_build_file_source() {
        let path = testutil::temp_file(SNAPSHOT);
        let source = build_source(FeedKind::File, &path).unwrap();
        assert_eq!(source.name(), "file");
        assert!(source.fetch().await.unwrap().polymarket.is_some());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_build_replay_source_missing_file() {
        assert!(build_source(FeedKind::Replay, "/nonexistent/strikearb/session.jsonl").is_err());
    }
}
