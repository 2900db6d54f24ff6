//! Single-file quote source.
//!
//! Re-reads one JSON snapshot from disk on every fetch, so an external
//! poller can keep overwriting the file while the engine runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::{parse_snapshot, QuoteSource};
use crate::types::QuoteSnapshot;

pub struct FileQuoteSource {
    path: PathBuf,
}

impl FileQuoteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuoteSource for FileQuoteSource {
    async fn fetch(&self) -> Result<QuoteSnapshot> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read quote file: {}", self.path.display()))?;
        let snapshot = parse_snapshot(self.name(), &text)?;
        debug!(
            path = %self.path.display(),
            polymarket = snapshot.polymarket.is_some(),
            kalshi = snapshot.kalshi.is_some(),
            "Quotes loaded"
        );
        Ok(snapshot)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
