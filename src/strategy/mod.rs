//! Valuation engine: ladder building, line mapping, EV, Kelly sizing,
//! thresholds and per-game selection.
//!
//! The engine is a pure function of (boards, configuration): no I/O, no
//! state carried between calls. Games are independent of each other.

pub mod edge;
pub mod kelly;
pub mod ladder;
pub mod mapping;
pub mod market;
pub mod odds;
pub mod selector;
pub mod threshold;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::types::{Decision, Game, GameBoard, Skip, TargetQuote, ValuationError};
use edge::Valuation;
use kelly::{KellyCalculator, KellyConfig};
use ladder::Ladder;
use mapping::MappingParams;
use market::{model_for, MarketModel};
use selector::{Candidate, TieBreak};
use threshold::{ThresholdConfig, ThresholdPolicy};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything the engine needs besides the boards.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationConfig {
    pub bankroll: Decimal,
    pub kelly: KellyConfig,
    pub thresholds: ThresholdConfig,
    pub mapping: MappingParams,
    pub tie_break: TieBreak,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            bankroll: Decimal::from(500),
            kelly: KellyConfig::default(),
            thresholds: ThresholdConfig::default(),
            mapping: MappingParams::default(),
            tie_break: TieBreak::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Decision log
// ---------------------------------------------------------------------------

/// What happened to every candidate that made it through valuation.
#[derive(Debug, Clone)]
pub enum CandidateRecord {
    /// Chosen as the game's pick.
    Selected { game_id: String, candidate: Candidate },
    /// EV below the (possibly elevated) bar.
    BelowThreshold { game_id: String, candidate: Candidate },
    /// EV cleared the bar but the stake rounded below the minimum.
    BelowMinStake { game_id: String, candidate: Candidate },
    /// Qualified, but another candidate in the same game ranked higher.
    Outranked { game_id: String, candidate: Candidate },
}

/// Result of evaluating one game.
#[derive(Debug, Clone, Default)]
pub struct GameEvaluation {
    pub decision: Option<Decision>,
    pub records: Vec<CandidateRecord>,
    pub skips: Vec<Skip>,
}

/// Result of evaluating a batch of games.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub decisions: Vec<Decision>,
    pub records: Vec<CandidateRecord>,
    pub skips: Vec<Skip>,
}

impl Evaluation {
    /// Candidates that reached valuation (selected or not).
    pub fn candidates_valued(&self) -> usize {
        self.records.len()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Pipelines ladder → mapping → valuation → sizing → threshold → selection.
pub struct ValuationEngine {
    config: ValuationConfig,
    kelly: KellyCalculator,
    thresholds: ThresholdPolicy,
}

impl ValuationEngine {
    pub fn new(config: ValuationConfig) -> Self {
        let kelly = KellyCalculator::new(config.kelly.clone());
        let thresholds = ThresholdPolicy::new(config.thresholds.clone());
        Self {
            config,
            kelly,
            thresholds,
        }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    /// Evaluate every game in a batch. Failures stay local to their
    /// game/market/candidate.
    pub fn evaluate(&self, boards: &[GameBoard]) -> Evaluation {
        let mut out = Evaluation::default();

        for board in boards {
            let game = self.evaluate_game(board);
            out.decisions.extend(game.decision);
            out.records.extend(game.records);
            out.skips.extend(game.skips);
        }

        info!(
            games = boards.len(),
            candidates = out.records.len(),
            skipped = out.skips.len(),
            decisions = out.decisions.len(),
            "Valuation pass complete"
        );

        out
    }

    /// Evaluate all markets of one game and pick at most one decision.
    pub fn evaluate_game(&self, board: &GameBoard) -> GameEvaluation {
        let game_id = board.game.id.clone();
        let mut out = GameEvaluation::default();
        let mut candidates: Vec<Candidate> = Vec::new();

        for &market in crate::types::MarketKind::ALL {
            let targets: Vec<&TargetQuote> = board.targets_for(market).collect();
            if targets.is_empty() {
                continue;
            }

            let model = model_for(market);
            let ladder = match board.reference_for(market) {
                Some(reference) => model.build_ladder(&reference.quotes),
                None => Err(ValuationError::ladder(market, "no reference quotes")),
            };
            let ladder = match ladder {
                Ok(ladder) => ladder,
                Err(error) => {
                    warn!(game_id = %game_id, market = %market, error = %error, "Market skipped");
                    out.skips.push(Skip {
                        game_id: game_id.clone(),
                        market,
                        side: None,
                        error,
                    });
                    continue;
                }
            };

            for target in targets {
                match self.evaluate_candidate(model, target, &ladder) {
                    Ok(candidate) => candidates.push(candidate),
                    Err(error) => {
                        match &error {
                            ValuationError::Probability { .. } => warn!(
                                game_id = %game_id,
                                market = %market,
                                side = %target.side,
                                error = %error,
                                "Data-quality issue, candidate skipped"
                            ),
                            _ => debug!(
                                game_id = %game_id,
                                market = %market,
                                side = %target.side,
                                error = %error,
                                "Candidate skipped"
                            ),
                        }
                        out.skips.push(Skip {
                            game_id: game_id.clone(),
                            market,
                            side: Some(target.side),
                            error,
                        });
                    }
                }
            }
        }

        for candidate in candidates.iter().filter(|c| !c.qualifies()) {
            let record = if candidate.clears_threshold() {
                CandidateRecord::BelowMinStake {
                    game_id: game_id.clone(),
                    candidate: candidate.clone(),
                }
            } else {
                CandidateRecord::BelowThreshold {
                    game_id: game_id.clone(),
                    candidate: candidate.clone(),
                }
            };
            out.records.push(record);
        }

        let (best, outranked) = selector::select(candidates, self.config.tie_break);
        out.records.extend(outranked.into_iter().map(|candidate| CandidateRecord::Outranked {
            game_id: game_id.clone(),
            candidate,
        }));

        if let Some(best) = best {
            let decision = Self::to_decision(&board.game, &best);
            info!(
                game_id = %game_id,
                market = %decision.market,
                pick = %decision.pick_label(),
                odds = decision.odds,
                ev = format!("{:.2}%", decision.ev * 100.0),
                stake = %decision.stake,
                risk = %decision.risk,
                "Pick selected"
            );
            out.records.push(CandidateRecord::Selected {
                game_id: game_id.clone(),
                candidate: best,
            });
            out.decision = Some(decision);
        }

        out
    }

    /// Map, value, size and threshold one target quote.
    fn evaluate_candidate(
        &self,
        model: &dyn MarketModel,
        target: &TargetQuote,
        ladder: &Ladder,
    ) -> Result<Candidate, ValuationError> {
        let mapping = model.map_target(target, ladder, &self.config.mapping)?;
        let valuation = Valuation::compute(target.odds, mapping.win, mapping.push)?;
        let sizing = self.kelly.size(&valuation, self.config.bankroll);
        let min_edge = self.thresholds.effective_min_edge(target.market, &mapping.risk);

        debug!(
            market = %target.market,
            side = %target.side,
            line = ?target.line,
            odds = target.odds,
            p_win = format!("{:.4}", mapping.win),
            p_push = format!("{:.4}", mapping.push),
            ev = format!("{:.4}", valuation.ev),
            min_edge = format!("{:.4}", min_edge),
            stake = %sizing.stake,
            "Candidate valued"
        );

        Ok(Candidate {
            market: target.market,
            side: target.side,
            line: target.line,
            odds: target.odds,
            mapping,
            valuation,
            sizing,
            min_edge,
        })
    }

    fn to_decision(game: &Game, candidate: &Candidate) -> Decision {
        Decision {
            game_id: game.id.clone(),
            event: game.label(),
            commence_time: game.commence_time,
            market: candidate.market,
            side: candidate.side,
            pick: game.team(candidate.side).to_string(),
            line: candidate.line,
            odds: candidate.odds,
            win_probability: candidate.mapping.win,
            push_probability: candidate.mapping.push,
            ev: candidate.valuation.ev,
            kelly_fraction: candidate.sizing.kelly_fraction,
            stake: candidate.sizing.stake,
            risk: candidate.mapping.risk,
            min_edge: candidate.min_edge,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
