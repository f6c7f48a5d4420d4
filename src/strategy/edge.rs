//! Expected value in the American odds convention.
//!
//! EV per unit stake is `p_win * b - p_lose`, where a push returns the
//! stake and so contributes nothing. Break-even win probability scales down
//! with push probability: `(1 - p_push) / (1 + b)`.

use serde::Serialize;

use super::odds;
use crate::types::{ValuationError, PROBABILITY_TOLERANCE};

/// EV and break-even for one priced outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Valuation {
    pub odds: i32,
    /// Net payout per unit stake.
    pub payout: f64,
    pub p_win: f64,
    pub p_push: f64,
    pub p_lose: f64,
    /// Expected profit per unit stake.
    pub ev: f64,
    pub break_even: f64,
}

impl Valuation {
    /// Value a bet at `odds` given outcome probabilities.
    pub fn compute(odds: i32, p_win: f64, p_push: f64) -> Result<Self, ValuationError> {
        let payout = odds::payout_multiple(odds)
            .ok_or_else(|| ValuationError::probability(format!("cannot derive payout from odds {odds}")))?;

        let p_win = unit_probability("win", p_win)?;
        let p_push = unit_probability("push", p_push)?;

        let p_lose = 1.0 - p_win - p_push;
        if p_lose < -PROBABILITY_TOLERANCE {
            return Err(ValuationError::probability(format!(
                "negative lose probability {p_lose:.6} (win={p_win:.4}, push={p_push:.4})"
            )));
        }
        let p_lose = p_lose.max(0.0);

        Ok(Self {
            odds,
            payout,
            p_win,
            p_push,
            p_lose,
            ev: p_win * payout - p_lose,
            break_even: (1.0 - p_push) / (1.0 + payout),
        })
    }

    /// Whether the win probability clears break-even.
    pub fn is_positive(&self) -> bool {
        self.ev > 0.0
    }
}

/// Check a probability lies in [0, 1] (within tolerance) and clamp it.
fn unit_probability(name: &str, p: f64) -> Result<f64, ValuationError> {
    if !p.is_finite() || p < -PROBABILITY_TOLERANCE || p > 1.0 + PROBABILITY_TOLERANCE {
        return Err(ValuationError::probability(format!("{name} probability {p} outside [0, 1]")));
    }
    Ok(p.clamp(0.0, 1.0))
}

/// Break-even win probability for a price, accounting for pushes.
pub fn break_even_probability(odds: i32, p_push: f64) -> Option<f64> {
    let payout = odds::payout_multiple(odds)?;
    Some((1.0 - p_push.clamp(0.0, 1.0)) / (1.0 + payout))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minus_110_worked_example() {
        let v = Valuation::compute(-110, 0.524, 0.0).unwrap();
        let expected = 0.524 * (100.0 / 110.0) - 0.476;
        assert!((v.ev - expected).abs() < 1e-12);
        assert!((v.ev - 0.000364).abs() < 1e-6);
        assert!(v.is_positive());
    }

    #[test]
    fn test_positive_odds_ev() {
        let v = Valuation::compute(200, 0.5, 0.0).unwrap();
        assert!((v.ev - 0.5).abs() < 1e-12);
        assert!((v.payout - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_break_even_gives_zero_ev() {
        let v = Valuation::compute(-150, 0.6, 0.0).unwrap();
        assert!(v.ev.abs() < 1e-12);
        assert!((v.break_even - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_push_lowers_break_even() {
        let no_push = break_even_probability(-110, 0.0).unwrap();
        let with_push = break_even_probability(-110, 0.08).unwrap();
        assert!((no_push - 110.0 / 210.0).abs() < 1e-12);
        assert!((with_push - 0.92 * 110.0 / 210.0).abs() < 1e-12);

        // Same win probability is worth more when a push saves some losses.
        let a = Valuation::compute(-110, 0.50, 0.0).unwrap();
        let b = Valuation::compute(-110, 0.50, 0.08).unwrap();
        assert!(b.ev > a.ev);
        assert!((b.p_lose - 0.42).abs() < 1e-12);
    }

    #[test]
    fn test_negative_lose_probability_rejected() {
        let err = Valuation::compute(-110, 0.7, 0.4).unwrap_err();
        assert!(matches!(err, ValuationError::Probability { .. }));
    }

    #[test]
    fn test_tiny_negative_lose_clamped() {
        let v = Valuation::compute(-110, 0.6, 0.4 + 1e-9).unwrap();
        assert_eq!(v.p_lose, 0.0);
    }

    #[test]
    fn test_out_of_range_probability() {
        assert!(Valuation::compute(-110, 1.2, 0.0).is_err());
        assert!(Valuation::compute(-110, f64::NAN, 0.0).is_err());
        assert!(Valuation::compute(-110, 0.5, -0.1).is_err());
    }

    #[test]
    fn test_malformed_odds() {
        let err = Valuation::compute(0, 0.5, 0.0).unwrap_err();
        assert!(err.to_string().contains("odds 0"));
    }
}
