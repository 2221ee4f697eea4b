//! Property tests for grid expansion and ranking.

use proptest::prelude::*;
use trendgate_core::config::EquitySampling;
use trendgate_core::fingerprint::RunFingerprint;
use trendgate_core::ledger::LedgerReport;
use trendgate_core::metrics::RunMetrics;
use trendgate_core::StrategyParams;
use trendgate_runner::ranking::rank;
use trendgate_runner::{
    Axis, Evaluation, FitnessMetric, ParamGrid, PointOutcome, Score, SweepEntry, SweepParam,
};

// ── Strategies (proptest) ──

const PARAMS: [SweepParam; 4] = [
    SweepParam::AtrLength,
    SweepParam::Multiplier,
    SweepParam::StopPercent,
    SweepParam::Leverage,
];

fn arb_grid() -> impl Strategy<Value = ParamGrid> {
    prop::collection::vec(1usize..5, 1..=4).prop_map(|lens| {
        lens.iter()
            .zip(PARAMS)
            .fold(ParamGrid::new(StrategyParams::default()), |grid, (&len, param)| {
                let values = (0..len).map(|i| 1.0 + i as f64).collect();
                grid.with_axis(Axis::new(param, values))
            })
    })
}

fn metrics(drawdown: f64) -> RunMetrics {
    let report = LedgerReport {
        equity_curve: Vec::new(),
        sampling: EquitySampling::PerCandle,
        initial_capital: 10_000.0,
        final_capital: 10_000.0,
        final_equity: 10_000.0,
        total_commission: 0.0,
        capital_exhausted_at: None,
    };
    RunMetrics {
        max_drawdown_percent: drawdown,
        ..RunMetrics::compute(&[], &report)
    }
}

fn entry_from(grid_index: usize, score: Option<f64>, drawdown: f64) -> SweepEntry {
    let outcome = match score {
        Some(score) => PointOutcome::Evaluated(Evaluation {
            score,
            metrics: metrics(drawdown),
            final_capital: 10_000.0,
            fingerprint: RunFingerprint(String::new()),
            cached: false,
        }),
        None => PointOutcome::Failed {
            reason: "invalid".into(),
        },
    };
    SweepEntry {
        grid_index,
        assignments: Vec::new(),
        outcome,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn grid_points_are_distinct_and_complete(grid in arb_grid()) {
        let points = grid.points();
        prop_assert_eq!(points.len(), grid.size());

        let mut seen = std::collections::HashSet::new();
        for point in &points {
            prop_assert!(seen.insert(grid.coordinates(point.grid_index)));
            prop_assert_eq!(point.assignments.len(), grid.axes.len());
            for (assignment, axis) in point.assignments.iter().zip(&grid.axes) {
                prop_assert_eq!(assignment.param, axis.param);
                prop_assert!(axis.values.contains(&assignment.value));
            }
        }
    }

    #[test]
    fn ranking_is_independent_of_arrival_order(
        raw in prop::collection::vec((prop::option::weighted(0.8, -50.0f64..50.0), 0.0f64..40.0), 1..12),
        seed in any::<u64>(),
    ) {
        let entries: Vec<SweepEntry> = raw
            .iter()
            .enumerate()
            .map(|(i, (score, dd))| entry_from(i, score.map(|s| s.round()), dd.round()))
            .collect();

        let mut forward = entries.clone();
        let mut shuffled = entries;
        // Deterministic rotation stands in for arbitrary completion order.
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();

        rank(&mut forward);
        rank(&mut shuffled);
        let order = |v: &[SweepEntry]| v.iter().map(|e| e.grid_index).collect::<Vec<_>>();
        prop_assert_eq!(order(&forward), order(&shuffled));

        // Evaluated entries come first, in non-increasing score order.
        let evaluated: Vec<f64> = forward.iter().map_while(|e| e.score()).collect();
        prop_assert!(evaluated.windows(2).all(|w| w[0] >= w[1]));
        prop_assert!(forward[evaluated.len()..].iter().all(|e| e.score().is_none()));
    }
}

#[test]
fn metric_score_matches_extract() {
    let candles = trendgate_core::synthetic::generate(&Default::default());
    let metrics = trendgate_core::run(&candles, &StrategyParams::default())
        .unwrap()
        .metrics;
    for metric in FitnessMetric::ALL {
        let a = metric.score(&metrics);
        let b = metric.extract(&metrics);
        assert!(a == b || (a.is_nan() && b.is_nan()));
    }
}
