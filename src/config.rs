//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the path in `STRIKEARB_CONFIG`) and
//! deserializes into strongly-typed sections. Every field has a default,
//! so a missing file or a partial one still yields a runnable config.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::engine::matcher::{MatcherConfig, DEFAULT_MAX_STRIKES_EACH_SIDE};
use crate::engine::simulator::SimulatorConfig;
use crate::feed::FeedKind;
use crate::types::{wire_decimal, StrikeArbError};

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "STRIKEARB_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub portfolio: PortfolioSection,
    pub feed: FeedSection,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineSection {
    pub tick_interval_ms: u64,
    pub strike_tolerance: f64,
    /// Zero disables the window and keeps the whole tolerance band.
    pub max_strikes_each_side: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            strike_tolerance: 2500.0,
            max_strikes_each_side: DEFAULT_MAX_STRIKES_EACH_SIDE,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PortfolioSection {
    pub initial_capital: f64,
    pub trade_size: f64,
    pub min_trade_size: f64,
    pub min_cash: f64,
}

impl Default for PortfolioSection {
    fn default() -> Self {
        Self {
            initial_capital: 100.0,
            trade_size: 10.0,
            min_trade_size: 1.0,
            min_cash: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FeedSection {
    pub kind: FeedKind,
    pub path: PathBuf,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            kind: FeedKind::Replay,
            path: PathBuf::from("demos/session.jsonl"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
    /// Trades returned by the simulation endpoint.
    pub history_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8000,
            history_limit: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Config path from `STRIKEARB_CONFIG`, or `config.toml`.
    pub fn path_from_env() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn validate(&self) -> Result<(), StrikeArbError> {
        let positive = [
            ("engine.strike_tolerance", self.engine.strike_tolerance),
            ("portfolio.initial_capital", self.portfolio.initial_capital),
            ("portfolio.trade_size", self.portfolio.trade_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(StrikeArbError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        let non_negative = [
            ("portfolio.min_trade_size", self.portfolio.min_trade_size),
            ("portfolio.min_cash", self.portfolio.min_cash),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(StrikeArbError::Config(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if self.portfolio.min_trade_size > self.portfolio.trade_size {
            return Err(StrikeArbError::Config(format!(
                "portfolio.min_trade_size ({}) exceeds trade_size ({})",
                self.portfolio.min_trade_size, self.portfolio.trade_size
            )));
        }
        if self.engine.tick_interval_ms == 0 {
            return Err(StrikeArbError::Config(
                "engine.tick_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.dashboard.enabled && self.dashboard.port == 0 {
            return Err(StrikeArbError::Config("dashboard.port must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.engine.tick_interval_ms)
    }

    pub fn matcher(&self) -> Result<MatcherConfig, StrikeArbError> {
        Ok(MatcherConfig {
            strike_tolerance: to_decimal("engine.strike_tolerance", self.engine.strike_tolerance)?,
            max_strikes_each_side: match self.engine.max_strikes_each_side {
                0 => None,
                n => Some(n),
            },
        })
    }

    pub fn simulator(&self) -> Result<SimulatorConfig, StrikeArbError> {
        let p = &self.portfolio;
        Ok(SimulatorConfig {
            initial_capital: to_decimal("portfolio.initial_capital", p.initial_capital)?,
            trade_size: to_decimal("portfolio.trade_size", p.trade_size)?,
            min_trade_size: to_decimal("portfolio.min_trade_size", p.min_trade_size)?,
            min_cash: to_decimal("portfolio.min_cash", p.min_cash)?,
        })
    }
}

fn to_decimal(name: &str, value: f64) -> Result<Decimal, StrikeArbError> {
    wire_decimal(value)
        .ok_or_else(|| StrikeArbError::Config(format!("{name} is not representable ({value})")))
}
