//! Poller: one fetch → evaluate → persist → notify cycle per tick.
//!
//! The poller skips evaluation when the board is unchanged since the last
//! successful cycle, persists the top decisions by EV, and only notifies
//! decisions the store had not seen before. Quota exhaustion is reported to
//! the operator at most once per calendar month.

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc, Weekday};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::feeds::OddsFeed;
use crate::notify::{render_decision, Notifier};
use crate::storage::SignalStore;
use crate::strategy::ValuationEngine;
use crate::types::{Decision, GameBoard, PriceQuote, TargetQuote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub title: String,
    pub max_alerts: usize,
    pub regular_interval: Duration,
    pub gameday_interval: Duration,
    pub gameday_weekdays: Vec<Weekday>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

impl PollerConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        Self {
            title: cfg.alerts.title.clone(),
            max_alerts: cfg.alerts.max_alerts,
            regular_interval: Duration::from_secs(cfg.agent.regular_interval_secs),
            gameday_interval: Duration::from_secs(cfg.agent.gameday_interval_secs),
            gameday_weekdays: cfg.agent.gameday_weekdays.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Board evaluated and decisions processed.
    Evaluated,
    /// Board identical to the last evaluated one.
    Unchanged,
    /// Feed quota exhausted; nothing fetched.
    QuotaExhausted,
}

/// Summary of one poll cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub run_id: Uuid,
    pub cycle_number: u64,
    pub outcome: CycleOutcome,
    pub games: usize,
    pub candidates: usize,
    pub skipped: usize,
    pub decisions: usize,
    /// Decisions newly written to the store.
    pub stored: usize,
    /// Lines sent to the notifier.
    pub notified: usize,
    pub timestamp: DateTime<Utc>,
}

impl CycleReport {
    fn empty(run_id: Uuid, cycle_number: u64, outcome: CycleOutcome, timestamp: DateTime<Utc>) -> Self {
        Self {
            run_id,
            cycle_number,
            outcome,
            games: 0,
            candidates: 0,
            skipped: 0,
            decisions: 0,
            stored: 0,
            notified: 0,
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Board signature
// ---------------------------------------------------------------------------

fn hash_quote(q: &PriceQuote, h: &mut DefaultHasher) {
    q.side.hash(h);
    q.odds.hash(h);
    q.point.map(f64::to_bits).hash(h);
}

fn hash_target(t: &TargetQuote, h: &mut DefaultHasher) {
    t.market.hash(h);
    t.side.hash(h);
    t.odds.hash(h);
    t.line.map(f64::to_bits).hash(h);
}

/// Fingerprint of every game, price and line on the board.
pub fn board_signature(boards: &[GameBoard]) -> u64 {
    let mut h = DefaultHasher::new();
    boards.len().hash(&mut h);
    for board in boards {
        board.game.id.hash(&mut h);
        board.game.commence_time.timestamp().hash(&mut h);
        board.targets.len().hash(&mut h);
        for t in &board.targets {
            hash_target(t, &mut h);
        }
        board.references.len().hash(&mut h);
        for r in &board.references {
            r.market.hash(&mut h);
            r.quotes.len().hash(&mut h);
            for q in &r.quotes {
                hash_quote(q, &mut h);
            }
        }
    }
    h.finish()
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

pub struct Poller {
    feed: Box<dyn OddsFeed>,
    engine: ValuationEngine,
    store: SignalStore,
    notifier: Box<dyn Notifier>,
    config: PollerConfig,
    last_signature: Option<u64>,
    /// (year, month) of the last quota notice.
    quota_notice: Option<(i32, u32)>,
    cycle_count: u64,
}

impl Poller {
    pub fn new(
        feed: Box<dyn OddsFeed>,
        engine: ValuationEngine,
        store: SignalStore,
        notifier: Box<dyn Notifier>,
        config: PollerConfig,
    ) -> Self {
        Self {
            feed,
            engine,
            store,
            notifier,
            config,
            last_signature: None,
            quota_notice: None,
            cycle_count: 0,
        }
    }

    pub fn store(&self) -> &SignalStore {
        &self.store
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Wait before the next cycle: game-day cadence on configured weekdays.
    pub fn poll_interval(&self, now: DateTime<Utc>) -> Duration {
        if self.config.gameday_weekdays.contains(&now.weekday()) {
            self.config.gameday_interval
        } else {
            self.config.regular_interval
        }
    }

    pub async fn run_once(&mut self) -> Result<CycleReport> {
        self.run_once_at(Utc::now()).await
    }

    /// Run one cycle as of `now`.
    ///
    /// Feed errors other than quota exhaustion, and storage errors, fail the
    /// cycle. A failed cycle leaves the board signature untouched so the
    /// next tick retries.
    pub async fn run_once_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        self.cycle_count += 1;
        let run_id = Uuid::new_v4();
        let cycle = self.cycle_count;
        debug!(run_id = %run_id, cycle, "Starting cycle");

        let boards = match self.feed.fetch_board().await {
            Ok(boards) => boards,
            Err(e) if e.is_quota() => {
                warn!(run_id = %run_id, error = %e, "Odds API quota exhausted");
                self.notify_quota(now, &e.to_string()).await;
                return Ok(CycleReport::empty(run_id, cycle, CycleOutcome::QuotaExhausted, now));
            }
            Err(e) => return Err(e.into()),
        };

        let signature = board_signature(&boards);
        if self.last_signature == Some(signature) {
            info!(run_id = %run_id, games = boards.len(), "Board unchanged, skipping evaluation");
            let mut report = CycleReport::empty(run_id, cycle, CycleOutcome::Unchanged, now);
            report.games = boards.len();
            return Ok(report);
        }

        let evaluation = self.engine.evaluate(&boards);

        let mut decisions: Vec<Decision> = evaluation.decisions.clone();
        decisions.sort_by(|a, b| b.ev.total_cmp(&a.ev));
        decisions.truncate(self.config.max_alerts);

        let mut lines = Vec::new();
        let mut store_error = None;
        for decision in &decisions {
            match self.store.save(decision).await {
                Ok(true) => lines.push(render_decision(decision)),
                Ok(false) => debug!(run_id = %run_id, game_id = %decision.game_id, "Signal already sent"),
                Err(e) => {
                    store_error = Some(e);
                    break;
                }
            }
        }
        let stored = lines.len();

        // Rows already written dedup on the retry, so they go out now even
        // when a later insert failed.
        if !lines.is_empty() {
            if let Err(e) = self.notifier.push(&self.config.title, &lines).await {
                error!(run_id = %run_id, error = %e, "Notification failed");
            }
        }

        if let Some(e) = store_error {
            warn!(run_id = %run_id, stored, "Storage failed partway through cycle");
            return Err(e);
        }

        self.last_signature = Some(signature);

        let report = CycleReport {
            run_id,
            cycle_number: cycle,
            outcome: CycleOutcome::Evaluated,
            games: boards.len(),
            candidates: evaluation.candidates_valued(),
            skipped: evaluation.skips.len(),
            decisions: evaluation.decisions.len(),
            stored,
            notified: lines.len(),
            timestamp: now,
        };
        Ok(report)
    }

    async fn notify_quota(&mut self, now: DateTime<Utc>, reason: &str) {
        let month = (now.year(), now.month());
        if self.quota_notice == Some(month) {
            debug!("Quota notice already sent this month");
            return;
        }
        let lines = vec![format!("{reason}. Polling continues; no signals until the quota resets.")];
        match self.notifier.push(&self.config.title, &lines).await {
            Ok(()) => self.quota_notice = Some(month),
            Err(e) => error!(error = %e, "Quota notification failed; will retry next cycle"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
