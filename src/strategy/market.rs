//! Per-market ladder construction and line mapping.
//!
//! Adding a market (e.g. totals) means adding a `MarketKind` variant and a
//! `MarketModel` implementation; the engine itself does not branch on the
//! market kind.

use super::ladder::{self, Ladder};
use super::mapping::{self, MappingParams, MappingResult};
use crate::types::{MarketKind, PriceQuote, TargetQuote, ValuationError};

/// Capabilities the valuation engine needs from a market kind.
pub trait MarketModel: Send + Sync {
    fn kind(&self) -> MarketKind;

    /// Build the fair ladder from reference quotes.
    fn build_ladder(&self, quotes: &[PriceQuote]) -> Result<Ladder, ValuationError>;

    /// Map a target quote onto a ladder built by this model.
    fn map_target(
        &self,
        target: &TargetQuote,
        ladder: &Ladder,
        params: &MappingParams,
    ) -> Result<MappingResult, ValuationError>;
}

/// Point spreads with alternate lines.
pub struct SpreadModel;

impl MarketModel for SpreadModel {
    fn kind(&self) -> MarketKind {
        MarketKind::Spread
    }

    fn build_ladder(&self, quotes: &[PriceQuote]) -> Result<Ladder, ValuationError> {
        ladder::build_spread_ladder(quotes)
    }

    fn map_target(
        &self,
        target: &TargetQuote,
        ladder: &Ladder,
        params: &MappingParams,
    ) -> Result<MappingResult, ValuationError> {
        let line = target
            .line
            .filter(|l| l.is_finite())
            .ok_or_else(|| ValuationError::interpolation(f64::NAN, "target spread quote has no line"))?;
        mapping::map_spread(target.side, line, ladder, params)
    }
}

/// Two-way moneyline.
pub struct MoneylineModel;

impl MarketModel for MoneylineModel {
    fn kind(&self) -> MarketKind {
        MarketKind::Moneyline
    }

    fn build_ladder(&self, quotes: &[PriceQuote]) -> Result<Ladder, ValuationError> {
        ladder::build_moneyline_ladder(quotes)
    }

    fn map_target(
        &self,
        target: &TargetQuote,
        ladder: &Ladder,
        _params: &MappingParams,
    ) -> Result<MappingResult, ValuationError> {
        mapping::map_moneyline(target.side, ladder)
    }
}

/// The model implementing a market kind.
pub fn model_for(kind: MarketKind) -> &'static dyn MarketModel {
    match kind {
        MarketKind::Spread => &SpreadModel,
        MarketKind::Moneyline => &MoneylineModel,
    }
}
