//! Line mapping.
//!
//! Maps the target book's exact line onto the reference ladder. Exact lines
//! are read verbatim; anything else is interpolated between the two
//! bracketing ladder points, provided both are within the configured gap.
//!
//! Push mass is only physically possible at whole-number spreads. Between
//! brackets it is estimated from the local slope of the cover probability
//! (one point of slope ≈ probability of landing exactly on the number) and
//! fades linearly to zero at half points.

use serde::Serialize;

use super::ladder::{is_integer_line, Ladder, LINE_EPSILON};
use crate::types::{MappingRisk, Side, ValuationError};

/// Margins where push mass concentrates in football.
pub const KEY_NUMBERS: [f64; 2] = [3.0, 7.0];

/// Mapping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MappingParams {
    /// Largest distance (points) from the target to either bracket.
    pub max_gap: f64,
    /// Lines within this distance of a key number are flagged.
    pub key_number_epsilon: f64,
}

impl Default for MappingParams {
    fn default() -> Self {
        Self {
            max_gap: 1.0,
            key_number_epsilon: 0.25,
        }
    }
}

/// Outcome probabilities for one side at one target line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MappingResult {
    pub win: f64,
    pub push: f64,
    pub lose: f64,
    pub risk: MappingRisk,
}

impl MappingResult {
    /// The same outcome seen from the other side.
    pub fn flipped(self) -> Self {
        Self {
            win: self.lose,
            push: self.push,
            lose: self.win,
            risk: self.risk,
        }
    }

    fn for_side(self, side: Side) -> Self {
        match side {
            Side::Home => self,
            Side::Away => self.flipped(),
        }
    }
}

/// Whether a line sits within `epsilon` of 3 or 7 (either sign).
pub fn near_key_number(line: f64, epsilon: f64) -> bool {
    KEY_NUMBERS
        .iter()
        .any(|k| (line.abs() - k).abs() <= epsilon + LINE_EPSILON)
}

/// 1 at whole numbers, 0 at half points, linear in between.
fn integer_weight(line: f64) -> f64 {
    let distance = (line - line.round()).abs();
    (1.0 - 2.0 * distance).max(0.0)
}

/// Map a spread quote (`line` is the quoted side's own line).
pub fn map_spread(
    side: Side,
    line: f64,
    ladder: &Ladder,
    params: &MappingParams,
) -> Result<MappingResult, ValuationError> {
    let home_line = match side {
        Side::Home => line,
        Side::Away => -line,
    };
    map_home_line(home_line, ladder, params).map(|r| r.for_side(side))
}

fn map_home_line(
    line: f64,
    ladder: &Ladder,
    params: &MappingParams,
) -> Result<MappingResult, ValuationError> {
    if let Some(point) = ladder.exact(line) {
        return Ok(MappingResult {
            win: point.win,
            push: point.push,
            lose: point.lose(),
            risk: MappingRisk {
                interpolated: false,
                key_number: is_integer_line(line),
            },
        });
    }

    let (lo, hi) = match ladder.bracket(line) {
        (Some(lo), Some(hi)) => (lo, hi),
        (None, _) => return Err(ValuationError::interpolation(line, "no reference line below target")),
        (_, None) => return Err(ValuationError::interpolation(line, "no reference line above target")),
    };

    let gap = (line - lo.line).max(hi.line - line);
    if gap > params.max_gap + LINE_EPSILON {
        return Err(ValuationError::interpolation(
            line,
            format!(
                "bracket {:+}/{:+} is {gap:.1} points away (max {:.1})",
                lo.line, hi.line, params.max_gap
            ),
        ));
    }

    let span = hi.line - lo.line;
    let t = (line - lo.line) / span;
    let cover = lo.cover() + t * (hi.cover() - lo.cover());
    let slope = (hi.cover() - lo.cover()) / span;

    // win = cover - push/2 and lose = (1 - cover) - push/2 must both stay
    // inside the brackets' ranges; that bounds push from both ends. The
    // window is never empty because cover is a blend of the brackets' own.
    let (win_lo, win_hi) = (lo.win.min(hi.win), lo.win.max(hi.win));
    let (lose_lo, lose_hi) = (lo.lose().min(hi.lose()), lo.lose().max(hi.lose()));
    let push_floor = (2.0 * (cover - win_hi)).max(2.0 * (1.0 - cover - lose_hi)).max(0.0);
    let push_ceil = (2.0 * (cover - win_lo)).min(2.0 * (1.0 - cover - lose_lo)).min(1.0);

    let push = (slope.max(0.0) * integer_weight(line)).min(push_ceil).max(push_floor);
    let win = cover - push / 2.0;

    Ok(MappingResult {
        win,
        push,
        lose: 1.0 - cover - push / 2.0,
        risk: MappingRisk {
            interpolated: true,
            key_number: near_key_number(line, params.key_number_epsilon),
        },
    })
}

/// Map a moneyline quote against the single-point moneyline ladder.
pub fn map_moneyline(side: Side, ladder: &Ladder) -> Result<MappingResult, ValuationError> {
    let point = ladder
        .points()
        .first()
        .ok_or_else(|| ValuationError::interpolation(0.0, "empty moneyline ladder"))?;

    let home = MappingResult {
        win: point.win,
        push: point.push,
        lose: point.lose(),
        risk: MappingRisk::EXACT,
    };
    Ok(home.for_side(side))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ladder::LadderPoint;
    use crate::types::MarketKind;

    fn ladder(points: &[(f64, f64)]) -> Ladder {
        Ladder::new(
            MarketKind::Spread,
            points.iter().map(|&(l, w)| LadderPoint::new(l, w, 0.0)).collect(),
        )
        .unwrap()
    }

    fn params(max_gap: f64) -> MappingParams {
        MappingParams {
            max_gap,
            ..MappingParams::default()
        }
    }

    #[test]
    fn test_exact_half_point_verbatim() {
        let l = ladder(&[(-7.5, 0.52), (-6.5, 0.60)]);
        let r = map_spread(Side::Home, -7.5, &l, &params(1.0)).unwrap();
        assert_eq!(r.win, 0.52);
        assert_eq!(r.push, 0.0);
        assert_eq!(r.risk, MappingRisk::EXACT);
    }

    #[test]
    fn test_exact_integer_line_flags_key_number() {
        let l = Ladder::new(
            MarketKind::Spread,
            vec![
                LadderPoint::new(-3.5, 0.5, 0.0),
                LadderPoint::new(-3.0, 0.495, 0.1),
                LadderPoint::new(-2.5, 0.6, 0.0),
            ],
        )
        .unwrap();
        let r = map_spread(Side::Home, -3.0, &l, &params(1.0)).unwrap();
        assert_eq!((r.win, r.push), (0.495, 0.1));
        assert!(!r.risk.interpolated);
        assert!(r.risk.key_number);
    }

    #[test]
    fn test_whole_number_push_from_slope() {
        let l = ladder(&[(-7.5, 0.52), (-6.5, 0.60)]);

        let fav = map_spread(Side::Home, -7.0, &l, &params(1.0)).unwrap();
        assert!((fav.win - 0.52).abs() < 1e-9);
        assert!((fav.push - 0.08).abs() < 1e-9);
        assert!((fav.win + fav.push + fav.lose - 1.0).abs() < 1e-9);
        assert!(fav.risk.interpolated && fav.risk.key_number);

        let dog = map_spread(Side::Away, 7.0, &l, &params(1.0)).unwrap();
        assert!((dog.win - 0.40).abs() < 1e-9);
        assert!((dog.push - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_half_point_interpolation_has_no_push() {
        let l = ladder(&[(-5.5, 0.40), (-3.5, 0.50)]);
        let r = map_spread(Side::Home, -4.5, &l, &params(1.0)).unwrap();
        assert!((r.win - 0.45).abs() < 1e-9);
        assert_eq!(r.push, 0.0);
        assert!(r.risk.interpolated);
        assert!(!r.risk.key_number);

        let near_three = map_spread(Side::Away, 3.5, &l, &params(1.0)).unwrap();
        assert!((near_three.win - 0.50).abs() < 1e-9);
        assert!(!near_three.risk.interpolated);
    }

    #[test]
    fn test_key_number_window() {
        let default = MappingParams::default().key_number_epsilon;
        assert!(near_key_number(-3.0, default));
        assert!(near_key_number(6.8, default));
        assert!(!near_key_number(2.5, default));
        assert!(!near_key_number(-7.5, default));
        assert!(near_key_number(-3.0, 0.25));
        assert!(near_key_number(7.25, 0.25));
        assert!(!near_key_number(-4.5, 0.25));
        assert!(!near_key_number(10.0, 0.5));
    }

    fn assert_within_brackets(l: &Ladder, home_line: f64) {
        let (lo, hi) = match l.bracket(home_line) {
            (Some(lo), Some(hi)) if l.exact(home_line).is_none() => (lo, hi),
            _ => return,
        };
        let home = map_spread(Side::Home, home_line, l, &params(1.0)).unwrap();
        let away = map_spread(Side::Away, -home_line, l, &params(1.0)).unwrap();

        let (w_min, w_max) = (lo.win.min(hi.win), lo.win.max(hi.win));
        let (a_min, a_max) = (lo.lose().min(hi.lose()), lo.lose().max(hi.lose()));
        assert!(home.win >= w_min - 1e-12 && home.win <= w_max + 1e-12, "home {home_line}: {home:?}");
        assert!(away.win >= a_min - 1e-12 && away.win <= a_max + 1e-12, "away {}: {away:?}", -home_line);
        for r in [home, away] {
            assert!(r.push >= 0.0);
            assert!((r.win + r.push + r.lose - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_interpolated_win_between_brackets() {
        let l = ladder(&[(-10.5, 0.30), (-9.5, 0.33), (-8.5, 0.37), (-7.5, 0.45), (-6.5, 0.55)]);
        let mut line = -10.5;
        while line <= -6.5 {
            assert_within_brackets(&l, line);
            line += 0.25;
        }
    }

    #[test]
    fn test_interpolated_bounds_next_to_integer_push_point() {
        // The whole-number point carries estimated push; the slope toward
        // its neighbour implies more push than either bracket holds.
        let l = Ladder::new(
            MarketKind::Spread,
            vec![
                LadderPoint::new(-4.5, 0.70, 0.0),
                LadderPoint::new(-4.0, 0.7366, 0.0665),
                LadderPoint::new(-3.5, 0.8397, 0.0),
                LadderPoint::new(-3.0, 0.84, 0.09),
                LadderPoint::new(-2.5, 0.93, 0.0),
            ],
        )
        .unwrap();

        let away = map_spread(Side::Away, 3.9, &l, &params(1.0)).unwrap();
        assert!(away.win >= 0.1603 - 1e-12 && away.win <= 0.1969 + 1e-12, "{away:?}");

        let mut line = -4.5;
        while line <= -2.5 {
            assert_within_brackets(&l, line);
            line += 0.05;
        }
    }

    #[test]
    fn test_gap_too_wide() {
        let l = ladder(&[(-9.5, 0.48), (-3.5, 0.62)]);
        let err = map_spread(Side::Home, -7.0, &l, &params(1.0)).unwrap_err();
        assert!(matches!(err, ValuationError::Interpolation { .. }));
    }

    #[test]
    fn test_outside_ladder() {
        let l = ladder(&[(-7.5, 0.52), (-6.5, 0.60)]);
        assert!(map_spread(Side::Home, -8.0, &l, &params(1.0)).is_err());
        assert!(map_spread(Side::Away, 5.5, &l, &params(1.0)).is_err());
    }

    #[test]
    fn test_moneyline_sides() {
        let l = Ladder::new(MarketKind::Moneyline, vec![LadderPoint::new(0.0, 0.45, 0.0)]).unwrap();
        let home = map_moneyline(Side::Home, &l).unwrap();
        let away = map_moneyline(Side::Away, &l).unwrap();
        assert_eq!(home.win, 0.45);
        assert!((away.win - 0.55).abs() < 1e-12);
        assert_eq!(home.risk, MappingRisk::EXACT);
    }
}
