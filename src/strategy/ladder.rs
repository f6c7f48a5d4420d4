//! Fair-probability ladder built from the reference (sharp) book.
//!
//! Spread ladders are expressed from the home side's perspective: each
//! point's `line` is the home spread and `win` the probability that home
//! covers it. Moving up the ladder (home laying fewer / taking more points)
//! raises the cover probability, which is what the line mapper relies on
//! when it reads push mass off the slope.

use serde::Serialize;
use tracing::debug;

use super::odds;
use crate::types::{MarketKind, PriceQuote, Side, ValuationError, PROBABILITY_TOLERANCE};

/// Lines closer than this are the same line.
pub const LINE_EPSILON: f64 = 1e-9;

/// Minimum distinct lines for a usable spread ladder.
pub const MIN_SPREAD_POINTS: usize = 2;

pub(crate) fn same_line(a: f64, b: f64) -> bool {
    (a - b).abs() <= LINE_EPSILON
}

pub(crate) fn is_integer_line(line: f64) -> bool {
    (line - line.round()).abs() <= 1e-6
}

// ---------------------------------------------------------------------------
// Ladder
// ---------------------------------------------------------------------------

/// Fair outcome probabilities at one line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LadderPoint {
    pub line: f64,
    pub win: f64,
    pub push: f64,
}

impl LadderPoint {
    pub fn new(line: f64, win: f64, push: f64) -> Self {
        Self { line, win, push }
    }

    pub fn lose(&self) -> f64 {
        1.0 - self.win - self.push
    }

    /// Win probability with half of the push mass credited.
    ///
    /// This is the quantity that varies linearly between neighbouring lines.
    pub fn cover(&self) -> f64 {
        self.win + self.push / 2.0
    }
}

/// Ordered ladder for one game/market, strictly increasing by line.
#[derive(Debug, Clone, PartialEq)]
pub struct Ladder {
    market: MarketKind,
    points: Vec<LadderPoint>,
}

impl Ladder {
    /// Validate and sort points into a ladder.
    pub fn new(market: MarketKind, mut points: Vec<LadderPoint>) -> Result<Self, ValuationError> {
        if points.is_empty() {
            return Err(ValuationError::ladder(market, "no usable reference points"));
        }

        for p in &points {
            let in_range = |x: f64| x.is_finite() && (-PROBABILITY_TOLERANCE..=1.0 + PROBABILITY_TOLERANCE).contains(&x);
            if !p.line.is_finite() || !in_range(p.win) || !in_range(p.push) || p.lose() < -PROBABILITY_TOLERANCE {
                return Err(ValuationError::ladder(
                    market,
                    format!(
                        "inconsistent point at {:+}: win={:.4} push={:.4}",
                        p.line, p.win, p.push
                    ),
                ));
            }
        }

        points.sort_by(|a, b| a.line.total_cmp(&b.line));
        if points.windows(2).any(|w| same_line(w[0].line, w[1].line)) {
            return Err(ValuationError::ladder(market, "duplicate ladder line"));
        }

        Ok(Self { market, points })
    }

    pub fn market(&self) -> MarketKind {
        self.market
    }

    pub fn points(&self) -> &[LadderPoint] {
        &self.points
    }

    /// The point stored at exactly this line.
    pub fn exact(&self, line: f64) -> Option<&LadderPoint> {
        self.points.iter().find(|p| same_line(p.line, line))
    }

    /// Nearest points strictly below and strictly above `line`.
    pub fn bracket(&self, line: f64) -> (Option<&LadderPoint>, Option<&LadderPoint>) {
        let below = self.points.iter().rev().find(|p| p.line < line - LINE_EPSILON);
        let above = self.points.iter().find(|p| p.line > line + LINE_EPSILON);
        (below, above)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn check_odds(market: MarketKind, quote: &PriceQuote) -> Result<(), ValuationError> {
    if odds::is_valid_american(quote.odds) {
        Ok(())
    } else {
        Err(ValuationError::ladder(
            market,
            format!("malformed odds {} on {} side", quote.odds, quote.side),
        ))
    }
}

fn fair_home(market: MarketKind, home_odds: i32, away_odds: i32) -> Result<f64, ValuationError> {
    odds::fair_pair(home_odds, away_odds)
        .map(|(home, _)| home)
        .ok_or_else(|| ValuationError::ladder(market, format!("cannot de-vig {home_odds}/{away_odds}")))
}

/// Build a home-perspective spread ladder from paired reference quotes.
///
/// A line is usable only when both sides are priced (home at `h`, away at
/// `-h`). Integer lines straddled by both half-point neighbours get a push
/// estimate from the cover-probability step across them; their de-vigged
/// price is read as conditional on no push.
pub fn build_spread_ladder(quotes: &[PriceQuote]) -> Result<Ladder, ValuationError> {
    let market = MarketKind::Spread;

    // Key both sides by the home line.
    let mut home: Vec<(f64, i32)> = Vec::new();
    let mut away: Vec<(f64, i32)> = Vec::new();
    for quote in quotes {
        check_odds(market, quote)?;
        let point = quote
            .point
            .filter(|p| p.is_finite())
            .ok_or_else(|| ValuationError::ladder(market, format!("{} spread quote has no line", quote.side)))?;
        match quote.side {
            Side::Home => home.push((point, quote.odds)),
            Side::Away => away.push((-point, quote.odds)),
        }
    }

    let mut points: Vec<LadderPoint> = Vec::new();
    let mut unpaired = 0usize;
    for &(line, home_odds) in &home {
        if points.iter().any(|p| same_line(p.line, line)) {
            continue;
        }
        match away.iter().find(|(l, _)| same_line(*l, line)) {
            Some(&(_, away_odds)) => {
                let win = fair_home(market, home_odds, away_odds)?;
                points.push(LadderPoint::new(line, win, 0.0));
            }
            None => unpaired += 1,
        }
    }
    unpaired += away
        .iter()
        .filter(|(l, _)| !home.iter().any(|(h, _)| same_line(*h, *l)))
        .count();

    if unpaired > 0 {
        debug!(unpaired, paired = points.len(), "Dropped one-sided reference lines");
    }

    if points.len() < MIN_SPREAD_POINTS {
        return Err(ValuationError::ladder(
            market,
            format!("{} usable line(s), need at least {MIN_SPREAD_POINTS}", points.len()),
        ));
    }

    points.sort_by(|a, b| a.line.total_cmp(&b.line));
    let halves = points.clone();
    for point in points.iter_mut().filter(|p| is_integer_line(p.line)) {
        let below = halves.iter().find(|p| same_line(p.line, point.line - 0.5));
        let above = halves.iter().find(|p| same_line(p.line, point.line + 0.5));
        if let (Some(below), Some(above)) = (below, above) {
            let push = (above.win - below.win).clamp(0.0, 1.0);
            point.push = push;
            point.win *= 1.0 - push;
        }
    }

    Ladder::new(market, points)
}

/// Build the single-point moneyline ladder (line 0, home win probability).
pub fn build_moneyline_ladder(quotes: &[PriceQuote]) -> Result<Ladder, ValuationError> {
    let market = MarketKind::Moneyline;
    for quote in quotes {
        check_odds(market, quote)?;
    }

    let price = |side: Side| {
        quotes
            .iter()
            .find(|q| q.side == side)
            .map(|q| q.odds)
            .ok_or_else(|| ValuationError::ladder(market, format!("missing {side} price")))
    };
    let win = fair_home(market, price(Side::Home)?, price(Side::Away)?)?;

    Ladder::new(market, vec![LadderPoint::new(0.0, win, 0.0)])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
