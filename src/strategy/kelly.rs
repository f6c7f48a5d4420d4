//! Kelly criterion position sizing.
//!
//! Computes stakes using fractional Kelly with a per-bet cap, adjusted for
//! push probability (a push neither wins nor loses, so only `p_lose` counts
//! against the bet).

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use super::edge::Valuation;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Kelly sizing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (0.5 = half-Kelly).
    pub fraction: f64,
    /// Maximum stake as a fraction of bankroll.
    pub max_unit: f64,
    /// Minimum stake in dollars; smaller stakes are not worth placing.
    pub min_stake: Decimal,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            fraction: 0.5,
            max_unit: 0.02,
            min_stake: dec!(1.00),
        }
    }
}

// ---------------------------------------------------------------------------
// Kelly calculator
// ---------------------------------------------------------------------------

/// Stake recommendation for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizingResult {
    /// Raw (full) Kelly fraction; negative when the bet has no edge.
    pub kelly_fraction: f64,
    /// After the fractional multiplier and the max-unit cap.
    pub bet_fraction: f64,
    /// Dollar stake, rounded to cents.
    pub stake: Decimal,
    /// Stake clears the minimum.
    pub qualifies: bool,
}

pub struct KellyCalculator {
    config: KellyConfig,
}

impl KellyCalculator {
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    /// Access the Kelly configuration.
    pub fn config(&self) -> &KellyConfig {
        &self.config
    }

    /// Full Kelly fraction with pushes: f* = (b·p_win − p_lose) / b.
    pub fn full_kelly(valuation: &Valuation) -> f64 {
        (valuation.payout * valuation.p_win - valuation.p_lose) / valuation.payout
    }

    /// Size a stake for a valued candidate.
    ///
    /// The minimum-stake check is applied to the final, capped and rounded
    /// stake.
    pub fn size(&self, valuation: &Valuation, bankroll: Decimal) -> SizingResult {
        let kelly = Self::full_kelly(valuation);

        if bankroll <= Decimal::ZERO || !kelly.is_finite() {
            return SizingResult {
                kelly_fraction: kelly,
                bet_fraction: 0.0,
                stake: Decimal::ZERO,
                qualifies: false,
            };
        }

        let fractional = kelly.max(0.0) * self.config.fraction;
        let capped = fractional.min(self.config.max_unit).max(0.0);

        let stake = Decimal::from_f64(capped)
            .map(|f| round_cents(bankroll * f))
            .unwrap_or(Decimal::ZERO);
        // Rounding must never carry the stake past the cap.
        let ceiling = Decimal::from_f64(self.config.max_unit)
            .map(|f| (bankroll * f).round_dp_with_strategy(2, RoundingStrategy::ToZero))
            .unwrap_or(Decimal::ZERO);
        let stake = stake.min(ceiling).max(Decimal::ZERO);

        let qualifies = stake >= self.config.min_stake && stake > Decimal::ZERO;

        if !qualifies && kelly > 0.0 {
            debug!(
                odds = valuation.odds,
                raw_kelly = format!("{:.2}%", kelly * 100.0),
                stake = %stake,
                min = %self.config.min_stake,
                "Stake below minimum"
            );
        }

        SizingResult {
            kelly_fraction: kelly,
            bet_fraction: capped,
            stake,
            qualifies,
        }
    }
}

/// Round a dollar amount to the nearest cent (half away from zero).
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
