//! Shared types for the SHARPLINE engine.
//!
//! These types form the data model exchanged between the odds feeds, the
//! valuation core, storage and notifications. The valuation core only ever
//! consumes `GameBoard`s and produces `Decision`s; everything in between is
//! a value object that lives for a single run.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance for probability bookkeeping (win + push + lose = 1).
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which team a quote or pick refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => write!(f, "HOME"),
            Side::Away => write!(f, "AWAY"),
        }
    }
}

/// Market kinds the engine can value.
///
/// Each kind has its own ladder construction and line mapping, see
/// `strategy::market::model_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketKind {
    Spread,
    Moneyline,
}

impl MarketKind {
    /// All known markets, in evaluation order.
    pub const ALL: &'static [MarketKind] = &[MarketKind::Spread, MarketKind::Moneyline];

    /// Market key used by The Odds API.
    pub fn api_key(&self) -> &'static str {
        match self {
            MarketKind::Spread => "spreads",
            MarketKind::Moneyline => "h2h",
        }
    }

    /// Whether quotes in this market carry a point line.
    pub fn has_line(&self) -> bool {
        matches!(self, MarketKind::Spread)
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::Spread => write!(f, "SPREAD"),
            MarketKind::Moneyline => write!(f, "ML"),
        }
    }
}

/// Parse a market from either its display name or its API key (case-insensitive).
impl std::str::FromStr for MarketKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spread" | "spreads" | "alternate_spreads" => Ok(MarketKind::Spread),
            "ml" | "h2h" | "moneyline" => Ok(MarketKind::Moneyline),
            other => anyhow::bail!("Unknown market: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Quotes and boards
// ---------------------------------------------------------------------------

/// A scheduled game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub home: String,
    pub away: String,
    pub commence_time: DateTime<Utc>,
}

impl Game {
    /// Team name for a side.
    pub fn team(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    /// Human-readable "AWAY @ HOME" label.
    pub fn label(&self) -> String {
        format!("{} @ {}", self.away, self.home)
    }
}

/// One price from a book. Immutable once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub side: Side,
    /// American odds (e.g. -110, +150).
    pub odds: i32,
    /// Point line for this side (negative = laying points). `None` for moneylines.
    pub point: Option<f64>,
}

impl PriceQuote {
    pub fn new(side: Side, odds: i32, point: Option<f64>) -> Self {
        Self { side, odds, point }
    }
}

/// All reference-book quotes for one game/market, across every offered line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceQuoteSet {
    pub market: MarketKind,
    pub quotes: Vec<PriceQuote>,
}

/// The exact price the target book offers for one side of one market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetQuote {
    pub market: MarketKind,
    pub side: Side,
    pub odds: i32,
    pub line: Option<f64>,
}

/// Everything the valuation core needs for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameBoard {
    pub game: Game,
    pub targets: Vec<TargetQuote>,
    pub references: Vec<ReferenceQuoteSet>,
}

impl GameBoard {
    /// Reference quotes for a market, if the reference book priced it.
    pub fn reference_for(&self, market: MarketKind) -> Option<&ReferenceQuoteSet> {
        self.references.iter().find(|r| r.market == market)
    }

    /// Target quotes offered in a market.
    pub fn targets_for(&self, market: MarketKind) -> impl Iterator<Item = &TargetQuote> {
        self.targets.iter().filter(move |t| t.market == market)
    }
}

// ---------------------------------------------------------------------------
// Mapping risk
// ---------------------------------------------------------------------------

/// How much trust the line mapping deserves.
///
/// An exact mapping with neither flag set is the baseline; either flag
/// raises the EV bar (see `strategy::threshold`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MappingRisk {
    /// Target line was not on the reference ladder.
    pub interpolated: bool,
    /// Target line sits on or near a key number (3, 7) or is a whole number.
    pub key_number: bool,
}

impl MappingRisk {
    pub const EXACT: MappingRisk = MappingRisk {
        interpolated: false,
        key_number: false,
    };

    /// Number of elevated-risk conditions present (0, 1 or 2).
    pub fn elevation(&self) -> u8 {
        self.interpolated as u8 + self.key_number as u8
    }
}

impl fmt::Display for MappingRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.interpolated, self.key_number) {
            (false, false) => write!(f, "exact"),
            (true, false) => write!(f, "interpolated"),
            (false, true) => write!(f, "key-number"),
            (true, true) => write!(f, "interpolated+key-number"),
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Final per-game pick handed to storage and notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub game_id: String,
    /// "AWAY @ HOME"
    pub event: String,
    pub commence_time: DateTime<Utc>,
    pub market: MarketKind,
    pub side: Side,
    /// Team name of the picked side.
    pub pick: String,
    pub line: Option<f64>,
    pub odds: i32,
    pub win_probability: f64,
    pub push_probability: f64,
    /// Expected profit per unit stake.
    pub ev: f64,
    /// Full (unscaled) Kelly fraction.
    pub kelly_fraction: f64,
    pub stake: Decimal,
    pub risk: MappingRisk,
    /// EV bar this pick had to clear.
    pub min_edge: f64,
}

impl Decision {
    /// Pick label including the line for spreads ("KC -3.5").
    pub fn pick_label(&self) -> String {
        match self.line {
            Some(line) => format!("{} {:+}", self.pick, line),
            None => self.pick.clone(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {} (p={:.3}, ev={:.2}%, stake=${:.2}, {})",
            self.event,
            self.market,
            self.pick_label(),
            self.odds,
            self.win_probability,
            self.ev * 100.0,
            self.stake,
            self.risk,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Recoverable valuation failures. None of these abort a run: a ladder
/// failure drops one game/market, the others drop a single candidate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValuationError {
    #[error("Ladder error ({market}): {reason}")]
    Ladder { market: MarketKind, reason: String },

    #[error("Interpolation error at line {line:+}: {reason}")]
    Interpolation { line: f64, reason: String },

    #[error("Probability error: {reason}")]
    Probability { reason: String },
}

impl ValuationError {
    pub fn ladder(market: MarketKind, reason: impl Into<String>) -> Self {
        ValuationError::Ladder {
            market,
            reason: reason.into(),
        }
    }

    pub fn interpolation(line: f64, reason: impl Into<String>) -> Self {
        ValuationError::Interpolation {
            line,
            reason: reason.into(),
        }
    }

    pub fn probability(reason: impl Into<String>) -> Self {
        ValuationError::Probability {
            reason: reason.into(),
        }
    }

    /// Short machine-friendly tag for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ValuationError::Ladder { .. } => "ladder",
            ValuationError::Interpolation { .. } => "interpolation",
            ValuationError::Probability { .. } => "probability",
        }
    }
}

/// Why a game/market or a single candidate was dropped from a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Skip {
    pub game_id: String,
    pub market: MarketKind,
    /// `None` when the whole market was dropped (ladder failure).
    pub side: Option<Side>,
    pub error: ValuationError,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Some(side) => write!(f, "{} {} {}: {}", self.game_id, self.market, side, self.error),
            None => write!(f, "{} {}: {}", self.game_id, self.market, self.error),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
