//! STRIKEARB — cross-venue strike-ladder arbitrage scanner
//!
//! Entry point. Loads configuration, initialises structured logging,
//! starts the dashboard and runs the fetch→scan→simulate tick loop with
//! graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use strikearb::config::AppConfig;
use strikearb::dashboard::{self, routes::DashboardState};
use strikearb::engine::Engine;
use strikearb::feed;

const BANNER: &str = r#"
 ____ _____ ____  ___ _  _______    _    ____  ____
/ ___|_   _|  _ \|_ _| |/ / ____|  / \  |  _ \| __ )
\___ \ | | | |_) || || ' /|  _|   / _ \ | |_) |  _ \
 ___) || | |  _ < | || . \| |___ / ___ \|  _ <| |_) |
|____/ |_| |_| \_\___|_|\_\_____/_/   \_\_| \_\____/

  Cross-venue strike-ladder arbitrage, paper traded
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path = AppConfig::path_from_env();
    let cfg = AppConfig::load_or_default(&config_path)?;

    println!("{BANNER}");
    info!(
        config = %config_path.display(),
        tick_interval_ms = cfg.engine.tick_interval_ms,
        strike_tolerance = cfg.engine.strike_tolerance,
        initial_capital = cfg.portfolio.initial_capital,
        feed = ?cfg.feed.kind,
        "STRIKEARB starting up"
    );

    // -- Initialise components -------------------------------------------

    let source = feed::build_source(cfg.feed.kind, &cfg.feed.path)?;
    let engine = Arc::new(Engine::new(cfg.matcher()?, cfg.simulator()?));

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(
            Arc::clone(&engine),
            cfg.dashboard.history_limit,
        ));
        dashboard::spawn_dashboard(state, cfg.dashboard.port).await?;
    } else {
        warn!("Dashboard disabled, snapshots are only visible in logs");
    }

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(cfg.tick_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_ms = cfg.engine.tick_interval_ms,
        source = source.name(),
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                engine.run_tick(source.as_ref()).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    let last = engine.read();
    info!(
        ticks = last.tick,
        cash = format!("${:.2}", last.portfolio.cash_balance),
        equity = format!("${:.2}", last.portfolio.total_equity),
        locked = format!("${:.2}", last.portfolio.locked_profit),
        projected = format!("${:.2}", last.portfolio.projected_value),
        trades = last.portfolio.history.len(),
        "STRIKEARB shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("strikearb=info"));

    let json_logging = std::env::var("STRIKEARB_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
