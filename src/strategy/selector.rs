//! Per-game pick selection.
//!
//! At most one pick per game: the qualifying candidate with the highest EV.
//! Equal-EV candidates are ordered by the configured `TieBreak`, then by
//! lower mapping risk, then home before away, so the outcome never depends
//! on input order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::edge::Valuation;
use super::kelly::SizingResult;
use super::mapping::MappingResult;
use crate::types::{MarketKind, Side};

/// EVs closer than this are ties.
pub const EV_TIE_EPSILON: f64 = 1e-9;

/// How to order equal-EV candidates within a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    PreferSpread,
    PreferMoneyline,
    PreferHigherWinProbability,
}

/// One fully evaluated side of one market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub market: MarketKind,
    pub side: Side,
    pub line: Option<f64>,
    pub odds: i32,
    pub mapping: MappingResult,
    pub valuation: Valuation,
    pub sizing: SizingResult,
    /// Effective EV bar after risk elevation.
    pub min_edge: f64,
}

impl Candidate {
    pub fn ev(&self) -> f64 {
        self.valuation.ev
    }

    pub fn stake(&self) -> Decimal {
        self.sizing.stake
    }

    pub fn clears_threshold(&self) -> bool {
        self.valuation.ev >= self.min_edge
    }

    /// EV clears the (possibly elevated) bar and the stake clears the minimum.
    pub fn qualifies(&self) -> bool {
        self.clears_threshold() && self.sizing.qualifies
    }
}

fn market_rank(market: MarketKind, policy: TieBreak) -> u8 {
    match (policy, market) {
        (TieBreak::PreferMoneyline, MarketKind::Moneyline) => 0,
        (TieBreak::PreferMoneyline, MarketKind::Spread) => 1,
        (_, MarketKind::Spread) => 0,
        (_, MarketKind::Moneyline) => 1,
    }
}

fn side_rank(side: Side) -> u8 {
    match side {
        Side::Home => 0,
        Side::Away => 1,
    }
}

/// Ordering where `Less` means "preferred".
pub fn preference(a: &Candidate, b: &Candidate, policy: TieBreak) -> Ordering {
    if (a.ev() - b.ev()).abs() > EV_TIE_EPSILON {
        return b.ev().total_cmp(&a.ev());
    }

    let by_policy = match policy {
        TieBreak::PreferSpread | TieBreak::PreferMoneyline => {
            market_rank(a.market, policy).cmp(&market_rank(b.market, policy))
        }
        TieBreak::PreferHigherWinProbability => b.mapping.win.total_cmp(&a.mapping.win),
    };

    by_policy
        .then_with(|| a.mapping.risk.elevation().cmp(&b.mapping.risk.elevation()))
        .then_with(|| market_rank(a.market, TieBreak::PreferSpread).cmp(&market_rank(b.market, TieBreak::PreferSpread)))
        .then_with(|| side_rank(a.side).cmp(&side_rank(b.side)))
}

/// Pick the best qualifying candidate. Returns the winner (if any) and the
/// qualifying candidates it outranked.
pub fn select(candidates: Vec<Candidate>, policy: TieBreak) -> (Option<Candidate>, Vec<Candidate>) {
    let mut qualifying: Vec<Candidate> = candidates.into_iter().filter(Candidate::qualifies).collect();
    qualifying.sort_by(|a, b| preference(a, b, policy));

    let mut iter = qualifying.into_iter();
    let best = iter.next();
    (best, iter.collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
