//! Mock feed and notifier for integration testing.
//!
//! Provides a deterministic `OddsFeed` that serves a known slate of games
//! and a `Notifier` that records every message, all in-memory with no
//! external dependencies. Both are cheap `Arc` handles, so a test can keep a
//! clone after handing one to the poller.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use sharpline::feeds::odds_api::classify_status;
use sharpline::feeds::{FeedError, OddsFeed};
use sharpline::notify::Notifier;
use sharpline::types::*;

/// Kickoff used by every default game.
pub fn kickoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2099, 9, 7, 17, 0, 0).unwrap()
}

/// A clock well before kickoff.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2099, 9, 1, 12, 0, 0).unwrap()
}

/// A mock odds feed for deterministic testing.
#[derive(Clone)]
pub struct StaticFeed {
    boards: Arc<Mutex<Vec<GameBoard>>>,
    /// If set, `fetch_board` fails with the error this HTTP status maps to.
    force_status: Arc<Mutex<Option<u16>>>,
    calls: Arc<Mutex<usize>>,
}

impl StaticFeed {
    /// Create a feed serving the default slate.
    pub fn new() -> Self {
        Self::with_boards(Self::default_boards())
    }

    pub fn with_boards(boards: Vec<GameBoard>) -> Self {
        Self {
            boards: Arc::new(Mutex::new(boards)),
            force_status: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn set_boards(&self, boards: Vec<GameBoard>) {
        *self.boards.lock().unwrap() = boards;
    }

    /// Change one target price in place.
    pub fn set_target_odds(&self, game_id: &str, market: MarketKind, side: Side, odds: i32) {
        let mut boards = self.boards.lock().unwrap();
        for board in boards.iter_mut().filter(|b| b.game.id == game_id) {
            for target in board.targets.iter_mut().filter(|t| t.market == market && t.side == side) {
                target.odds = odds;
            }
        }
    }

    /// Force all subsequent fetches to fail as if the API returned `status`.
    pub fn set_status(&self, status: u16) {
        *self.force_status.lock().unwrap() = Some(status);
    }

    pub fn clear_status(&self) {
        *self.force_status.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Five games covering every path through the engine:
    ///
    /// - `jax`: exact alternate-line spread value (JAX -2.5 @ -110)
    /// - `kc`: interpolated key-number spread value (KC -3 @ -105)
    /// - `ne`: fairly priced moneyline, no pick
    /// - `phi`: no reference quotes at all
    /// - `sea`: reference lines too far from the target line
    pub fn default_boards() -> Vec<GameBoard> {
        vec![
            board(
                "jax",
                "JAX",
                "MIA",
                vec![
                    spread(Side::Home, -2.5, -110),
                    spread(Side::Away, 2.5, -110),
                    moneyline(Side::Home, -150),
                    moneyline(Side::Away, 130),
                ],
                vec![
                    spread_ladder(&[(-3.5, -110, -110), (-2.5, -150, 150), (-1.5, -200, 200)]),
                    moneyline_reference(-160, 140),
                ],
            ),
            board(
                "kc",
                "KC",
                "BUF",
                vec![spread(Side::Home, -3.0, -105), spread(Side::Away, 3.0, -115)],
                vec![spread_ladder(&[(-3.5, -110, -110), (-2.5, -150, 150)])],
            ),
            board(
                "ne",
                "NE",
                "NYJ",
                vec![moneyline(Side::Home, -110), moneyline(Side::Away, -110)],
                vec![moneyline_reference(-105, -115)],
            ),
            board(
                "phi",
                "PHI",
                "DAL",
                vec![moneyline(Side::Home, -120), moneyline(Side::Away, 100)],
                vec![],
            ),
            board(
                "sea",
                "SEA",
                "SF",
                vec![spread(Side::Home, -6.5, -110), spread(Side::Away, 6.5, -110)],
                vec![spread_ladder(&[(-9.5, 150, -170), (-3.5, -110, -110)])],
            ),
        ]
    }
}

// -- Board builders ------------------------------------------------------

pub fn board(
    id: &str,
    home: &str,
    away: &str,
    targets: Vec<TargetQuote>,
    references: Vec<ReferenceQuoteSet>,
) -> GameBoard {
    GameBoard {
        game: Game {
            id: id.to_string(),
            home: home.to_string(),
            away: away.to_string(),
            commence_time: kickoff(),
        },
        targets,
        references,
    }
}

pub fn spread(side: Side, line: f64, odds: i32) -> TargetQuote {
    TargetQuote {
        market: MarketKind::Spread,
        side,
        odds,
        line: Some(line),
    }
}

pub fn moneyline(side: Side, odds: i32) -> TargetQuote {
    TargetQuote {
        market: MarketKind::Moneyline,
        side,
        odds,
        line: None,
    }
}

/// Paired reference quotes keyed by home line: (home line, home odds, away odds).
pub fn spread_ladder(pairs: &[(f64, i32, i32)]) -> ReferenceQuoteSet {
    ReferenceQuoteSet {
        market: MarketKind::Spread,
        quotes: pairs
            .iter()
            .flat_map(|&(line, home, away)| {
                [
                    PriceQuote::new(Side::Home, home, Some(line)),
                    PriceQuote::new(Side::Away, away, Some(-line)),
                ]
            })
            .collect(),
    }
}

pub fn moneyline_reference(home: i32, away: i32) -> ReferenceQuoteSet {
    ReferenceQuoteSet {
        market: MarketKind::Moneyline,
        quotes: vec![PriceQuote::new(Side::Home, home, None), PriceQuote::new(Side::Away, away, None)],
    }
}

#[async_trait]
impl OddsFeed for StaticFeed {
    async fn fetch_board(&self) -> Result<Vec<GameBoard>, FeedError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(status) = *self.force_status.lock().unwrap() {
            if let Some(err) = classify_status(status, "forced by test") {
                return Err(err);
            }
        }
        Ok(self.boards.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Records every pushed message.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, Vec<String>)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn push(&self, title: &str, lines: &[String]) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), lines.to_vec()));
        Ok(())
    }
}
