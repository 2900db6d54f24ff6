//! Recorded-session replay source.
//!
//! Loads a sequence of snapshots once, either as a JSON array or as JSON
//! lines, and hands them out in order, wrapping around at the end. Each
//! delivered frame is stamped with the fetch time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use super::{parse_snapshot, QuoteSource};
use crate::types::{QuoteSnapshot, StrikeArbError};

const NAME: &str = "replay";

pub struct ReplayQuoteSource {
    frames: Vec<QuoteSnapshot>,
    cursor: AtomicUsize,
}

impl ReplayQuoteSource {
    pub fn new(frames: Vec<QuoteSnapshot>) -> Result<Self> {
        if frames.is_empty() {
            return Err(StrikeArbError::Feed {
                source_name: NAME.to_string(),
                message: "session has no frames".to_string(),
            }
            .into());
        }
        Ok(Self {
            frames,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file: {}", path.display()))?;
        let frames = Self::parse(&text)
            .with_context(|| format!("Failed to parse replay file: {}", path.display()))?;
        info!(path = %path.display(), frames = frames.len(), "Replay session loaded");
        Self::new(frames)
    }

    /// Accepts a JSON array of snapshots or one snapshot per line.
    /// Blank lines are ignored in the line format.
    pub fn parse(text: &str) -> Result<Vec<QuoteSnapshot>> {
        if text.trim_start().starts_with('[') {
            return serde_json::from_str(text).map_err(|e| {
                StrikeArbError::Feed {
                    source_name: NAME.to_string(),
                    message: format!("invalid snapshot array: {e}"),
                }
                .into()
            });
        }
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                parse_snapshot(NAME, line).with_context(|| format!("line {}", i + 1))
            })
            .collect()
    }

    /// Frames in one pass of the session. Never zero.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl QuoteSource for ReplayQuoteSource {
    async fn fetch(&self) -> Result<QuoteSnapshot> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        let mut frame = self.frames[index].clone();
        frame.fetched_at = Utc::now();
        debug!(frame = index, of = self.frames.len(), "Replaying frame");
        Ok(frame)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
