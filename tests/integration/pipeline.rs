//! End-to-end cycles through the poller with a deterministic slate.

use rust_decimal_macros::dec;

use sharpline::engine::{CycleOutcome, Poller, PollerConfig};
use sharpline::storage::SignalStore;
use sharpline::strategy::{CandidateRecord, ValuationConfig, ValuationEngine};
use sharpline::types::{MarketKind, Side};

use crate::mock_feed::*;

const TITLE: &str = "NFL +EV Signals (Hard Rock)";

async fn poller(feed: &StaticFeed, notifier: &RecordingNotifier) -> Poller {
    let engine = ValuationEngine::new(ValuationConfig {
        bankroll: dec!(500),
        ..ValuationConfig::default()
    });
    let store = SignalStore::in_memory().await.unwrap();
    let config = PollerConfig {
        title: TITLE.to_string(),
        ..PollerConfig::default()
    };
    Poller::new(Box::new(feed.clone()), engine, store, Box::new(notifier.clone()), config)
}

#[tokio::test]
async fn test_full_cycle_emits_expected_signals() {
    let feed = StaticFeed::new();
    let notifier = RecordingNotifier::new();
    let mut p = poller(&feed, &notifier).await;

    let report = p.run_once_at(now()).await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Evaluated);
    assert_eq!(report.games, 5);
    assert_eq!(report.decisions, 2);
    assert_eq!(report.stored, 2);
    // phi: missing moneyline reference; sea: both spread sides out of range.
    assert_eq!(report.skipped, 3);

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    let (title, lines) = &messages[0];
    assert_eq!(title, TITLE);
    assert_eq!(lines.len(), 2);

    // Ordered by EV: JAX (14.5%) before KC (7.6%).
    assert!(lines[0].starts_with("MIA @ JAX  SPREAD  Pick: **JAX -2.5**  Odds: -110  True: 0.60  Edge: 14.5%"));
    assert!(lines[0].contains("Stake: $10.00  Risk: exact  (KO 2099-09-07T17:00:00Z)"));
    assert!(lines[1].starts_with("BUF @ KC  SPREAD  Pick: **KC -3**  Odds: -105  True: 0.50  Edge: 7.6%"));
    assert!(lines[1].contains("Risk: interpolated+key-number"));

    let rows = p.store().recent(10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.market == MarketKind::Spread && r.stake == dec!(10.00)));
}

#[tokio::test]
async fn test_repeat_cycles_stay_quiet() {
    let feed = StaticFeed::new();
    let notifier = RecordingNotifier::new();
    let mut p = poller(&feed, &notifier).await;

    p.run_once_at(now()).await.unwrap();
    let unchanged = p.run_once_at(now()).await.unwrap();
    assert_eq!(unchanged.outcome, CycleOutcome::Unchanged);

    // A price change on a game with no pick re-evaluates the board but the
    // existing picks are already stored.
    feed.set_target_odds("ne", MarketKind::Moneyline, Side::Home, -112);
    let changed = p.run_once_at(now()).await.unwrap();
    assert_eq!(changed.outcome, CycleOutcome::Evaluated);
    assert_eq!(changed.decisions, 2);
    assert_eq!(changed.stored, 0);

    assert_eq!(notifier.messages().len(), 1);
    assert_eq!(feed.calls(), 3);
}

#[tokio::test]
async fn test_price_move_realerts_only_that_pick() {
    let feed = StaticFeed::new();
    let notifier = RecordingNotifier::new();
    let mut p = poller(&feed, &notifier).await;

    p.run_once_at(now()).await.unwrap();
    feed.set_target_odds("jax", MarketKind::Spread, Side::Home, -105);
    let report = p.run_once_at(now()).await.unwrap();
    assert_eq!(report.stored, 1);

    let messages = notifier.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].1.len(), 1);
    assert!(messages[1].1[0].contains("Pick: **JAX -2.5**  Odds: -105"));
    assert_eq!(p.store().count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_quota_exhaustion_then_recovery() {
    let feed = StaticFeed::new();
    let notifier = RecordingNotifier::new();
    let mut p = poller(&feed, &notifier).await;

    feed.set_status(429);
    let first = p.run_once_at(now()).await.unwrap();
    let second = p.run_once_at(now()).await.unwrap();
    assert_eq!(first.outcome, CycleOutcome::QuotaExhausted);
    assert_eq!(second.outcome, CycleOutcome::QuotaExhausted);

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].1[0].contains("quota"));

    feed.clear_status();
    let recovered = p.run_once_at(now()).await.unwrap();
    assert_eq!(recovered.outcome, CycleOutcome::Evaluated);
    assert_eq!(recovered.stored, 2);
}

#[tokio::test]
async fn test_non_quota_feed_error_fails_cycle() {
    let feed = StaticFeed::new();
    let notifier = RecordingNotifier::new();
    let mut p = poller(&feed, &notifier).await;

    feed.set_status(503);
    assert!(p.run_once_at(now()).await.is_err());
    assert!(notifier.messages().is_empty());

    // The failed cycle did not record a signature, so the next one evaluates.
    feed.clear_status();
    let report = p.run_once_at(now()).await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Evaluated);
}

#[tokio::test]
async fn test_empty_slate() {
    let feed = StaticFeed::with_boards(Vec::new());
    let notifier = RecordingNotifier::new();
    let mut p = poller(&feed, &notifier).await;

    let report = p.run_once_at(now()).await.unwrap();
    assert_eq!(report.games, 0);
    assert_eq!(report.decisions, 0);
    assert!(notifier.messages().is_empty());

    feed.set_boards(StaticFeed::default_boards());
    assert_eq!(p.run_once_at(now()).await.unwrap().stored, 2);
}

// ---------------------------------------------------------------------------
// Engine-level checks on the same slate
// ---------------------------------------------------------------------------

#[test]
fn test_evaluation_independent_of_game_order() {
    let engine = ValuationEngine::new(ValuationConfig::default());
    let boards = StaticFeed::default_boards();
    let mut reversed = boards.clone();
    reversed.reverse();

    let mut a = engine.evaluate(&boards).decisions;
    let mut b = engine.evaluate(&reversed).decisions;
    a.sort_by(|x, y| x.game_id.cmp(&y.game_id));
    b.sort_by(|x, y| x.game_id.cmp(&y.game_id));
    assert_eq!(a, b);
}

#[test]
fn test_decision_log_explains_every_candidate() {
    let engine = ValuationEngine::new(ValuationConfig::default());
    let eval = engine.evaluate(&StaticFeed::default_boards());

    let selected = eval
        .records
        .iter()
        .filter(|r| matches!(r, CandidateRecord::Selected { .. }))
        .count();
    assert_eq!(selected, 2);

    // jax: 4 candidates, kc: 2, ne: 2; phi and sea never reach valuation.
    assert_eq!(eval.records.len(), 8);
    assert!(eval.records.iter().all(|r| match r {
        CandidateRecord::Selected { game_id, .. }
        | CandidateRecord::BelowThreshold { game_id, .. }
        | CandidateRecord::BelowMinStake { game_id, .. }
        | CandidateRecord::Outranked { game_id, .. } => ["jax", "kc", "ne"].contains(&game_id.as_str()),
    }));
}

#[test]
fn test_moneyline_value_against_fair_reference() {
    // Reference +120/-120 makes home 45.45%; +150 at the target book is
    // worth 13.6% per unit and sizes to the 2% cap.
    let engine = ValuationEngine::new(ValuationConfig {
        bankroll: dec!(100),
        ..ValuationConfig::default()
    });
    let slate = vec![board(
        "g1",
        "HOM",
        "AWY",
        vec![moneyline(Side::Home, 150), moneyline(Side::Away, -160)],
        vec![moneyline_reference(120, -120)],
    )];
    let eval = engine.evaluate(&slate);
    assert_eq!(eval.decisions.len(), 1);
    let d = &eval.decisions[0];
    assert_eq!(d.pick, "HOM");
    assert!((d.ev - 0.1364).abs() < 1e-4);
    assert!((d.kelly_fraction - 0.0909).abs() < 1e-4);
    assert_eq!(d.stake, dec!(2.00));
}
