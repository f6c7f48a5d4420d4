//! American odds arithmetic.
//!
//! Everything here works directly in the American convention: positive odds
//! quote the profit on a 100 stake, negative odds the stake needed to win 100.

/// Whether a value is a well-formed American price (|odds| >= 100).
pub fn is_valid_american(odds: i32) -> bool {
    odds >= 100 || odds <= -100
}

/// Implied win probability including the book's margin.
///
/// +200 → 0.3333, -150 → 0.6.
pub fn implied_probability(odds: i32) -> Option<f64> {
    if !is_valid_american(odds) {
        return None;
    }
    let o = odds as f64;
    Some(if odds > 0 {
        100.0 / (o + 100.0)
    } else {
        o.abs() / (o.abs() + 100.0)
    })
}

/// Net payout per unit stake (`b`).
///
/// +120 → 1.2, -150 → 0.6667.
pub fn payout_multiple(odds: i32) -> Option<f64> {
    if !is_valid_american(odds) {
        return None;
    }
    let o = odds as f64;
    Some(if odds > 0 { o / 100.0 } else { 100.0 / o.abs() })
}

/// Remove the margin from a pair of implied probabilities.
pub fn devig(p1: f64, p2: f64) -> Option<(f64, f64)> {
    let total = p1 + p2;
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    Some((p1 / total, p2 / total))
}

/// Fair probabilities for both sides of a two-way price.
pub fn fair_pair(odds_a: i32, odds_b: i32) -> Option<(f64, f64)> {
    devig(implied_probability(odds_a)?, implied_probability(odds_b)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
