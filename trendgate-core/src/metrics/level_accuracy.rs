//! Per-take-profit-level accuracy: how often each ladder rung was reached.

use serde::{Deserialize, Serialize};

use super::ratio;
use crate::domain::ClosedTrade;

/// Trailing windows, in trades, over which accuracy is reported.
pub const ACCURACY_WINDOWS: [usize; 5] = [5, 10, 20, 50, 100];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowAccuracy {
    /// Requested window size.
    pub window: usize,
    /// Trades actually considered: min(window, total).
    pub trades: usize,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelAccuracy {
    /// 1-based ladder level.
    pub level: usize,
    pub hits: usize,
    pub overall: f64,
    pub windows: Vec<WindowAccuracy>,
}

/// Accuracy for every level that appears on any trade.
///
/// Windows take the most recent trades by closing order.
pub fn level_accuracy(trades: &[ClosedTrade]) -> Vec<LevelAccuracy> {
    let levels = trades
        .iter()
        .map(|t| t.per_level_outcomes.len())
        .max()
        .unwrap_or(0);

    (1..=levels)
        .map(|level| {
            let hits = count_hits(trades, level);
            let windows = ACCURACY_WINDOWS
                .iter()
                .map(|&window| {
                    let considered = window.min(trades.len());
                    let recent = &trades[trades.len() - considered..];
                    WindowAccuracy {
                        window,
                        trades: considered,
                        hit_rate: ratio(count_hits(recent, level), considered),
                    }
                })
                .collect();
            LevelAccuracy {
                level,
                hits,
                overall: ratio(hits, trades.len()),
                windows,
            }
        })
        .collect()
}

fn count_hits(trades: &[ClosedTrade], level: usize) -> usize {
    trades.iter().filter(|t| t.reached_level(level)).count()
}
