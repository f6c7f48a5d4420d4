//! EV thresholds.
//!
//! Each market has a base minimum EV. Mappings that needed interpolation or
//! land near a key number are less trustworthy, so their bar is raised into
//! the elevated band: one risk condition moves it to the low end of the
//! band, both to the high end.

use serde::Serialize;

use crate::types::{MappingRisk, MarketKind};

/// Threshold configuration (defaults; overridden by config.toml at runtime).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdConfig {
    pub spread_min_edge: f64,
    pub moneyline_min_edge: f64,
    /// Multiplier of the base for a single risk condition.
    pub elevated_band_low: f64,
    /// Multiplier of the base when both risk conditions apply.
    pub elevated_band_high: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            spread_min_edge: 0.03,
            moneyline_min_edge: 0.03,
            elevated_band_low: 1.5,
            elevated_band_high: 2.0,
        }
    }
}

pub struct ThresholdPolicy {
    config: ThresholdConfig,
}

impl ThresholdPolicy {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Base minimum EV for a market.
    pub fn base_for(&self, market: MarketKind) -> f64 {
        match market {
            MarketKind::Spread => self.config.spread_min_edge,
            MarketKind::Moneyline => self.config.moneyline_min_edge,
        }
    }

    /// Minimum EV after risk elevation.
    pub fn effective_min_edge(&self, market: MarketKind, risk: &MappingRisk) -> f64 {
        let base = self.base_for(market);
        match risk.elevation() {
            0 => base,
            1 => base * self.config.elevated_band_low,
            _ => base * self.config.elevated_band_high,
        }
    }

    /// Whether an EV clears the bar for this market and risk.
    pub fn passes(&self, ev: f64, market: MarketKind, risk: &MappingRisk) -> bool {
        ev >= self.effective_min_edge(market, risk)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
