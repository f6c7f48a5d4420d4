//! SHARPLINE: sharp-book ladder valuation and +EV signal service
//!
//! Entry point. Loads configuration, initialises structured logging, opens
//! the signal store, and runs the fetch→evaluate→alert loop with graceful
//! shutdown. The first cycle runs immediately.

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info};

use sharpline::config::AppConfig;
use sharpline::engine::{CycleOutcome, CycleReport, Poller, PollerConfig};
use sharpline::feeds::odds_api::OddsApiFeed;
use sharpline::notify::DiscordNotifier;
use sharpline::storage::SignalStore;
use sharpline::strategy::ValuationEngine;

const BANNER: &str = r#"
 ____  _   _    _    ____  ____  _     ___ _   _ _____
/ ___|| | | |  / \  |  _ \|  _ \| |   |_ _| \ | | ____|
\___ \| |_| | / _ \ | |_) | |_) | |    | ||  \| |  _|
 ___) |  _  |/ ___ \|  _ <|  __/| |___ | || |\  | |___
|____/|_| |_/_/   \_\_| \_\_|   |_____|___|_| \_|_____|

  Sharp-book ladder valuation → +EV signals
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Configuration: TOML + env overrides, validated
    let cfg = AppConfig::load_from_env()?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        bankroll = %cfg.agent.bankroll,
        target_book = %cfg.feed.target_book,
        reference_book = %cfg.feed.reference_book,
        "SHARPLINE starting up"
    );

    // -- Initialise components -------------------------------------------

    let feed = OddsApiFeed::new(&cfg.feed, AppConfig::resolve_secret(&cfg.feed.api_key_env))?;
    let notifier = DiscordNotifier::new(AppConfig::resolve_secret(&cfg.alerts.discord_webhook_env))?;
    let store = SignalStore::connect(&cfg.storage.database_url).await?;
    let engine = ValuationEngine::new(cfg.valuation_config());

    let mut poller = Poller::new(
        Box::new(feed),
        engine,
        store,
        Box::new(notifier),
        PollerConfig::from_app(&cfg),
    );

    // -- Main loop -------------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering main loop. Press Ctrl+C to stop.");

    loop {
        match poller.run_once().await {
            Ok(report) => log_cycle_report(&report),
            Err(e) => error!(error = %e, "Cycle failed; continuing to next"),
        }

        let wait = poller.poll_interval(Utc::now());
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(cycles = poller.cycle_count(), "SHARPLINE shut down cleanly.");
    Ok(())
}

/// Log a human-readable cycle summary.
fn log_cycle_report(report: &CycleReport) {
    match report.outcome {
        CycleOutcome::Evaluated => info!(
            run_id = %report.run_id,
            cycle = report.cycle_number,
            games = report.games,
            candidates = report.candidates,
            skipped = report.skipped,
            decisions = report.decisions,
            new_signals = report.stored,
            "Cycle complete"
        ),
        outcome => info!(
            run_id = %report.run_id,
            cycle = report.cycle_number,
            outcome = ?outcome,
            "Cycle complete"
        ),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sharpline=info"));

    let json_logging = std::env::var("SHARPLINE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
