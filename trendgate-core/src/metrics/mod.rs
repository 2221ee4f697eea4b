//! Performance metrics — pure reductions over closed trades and the equity curve.
//!
//! Division edge cases resolve to explicit sentinel values, never to a fault:
//! profit factor is `+∞` with no losses and some profit, `0` with neither.

pub mod level_accuracy;
pub mod monthly;

pub use level_accuracy::{level_accuracy, LevelAccuracy, WindowAccuracy, ACCURACY_WINDOWS};
pub use monthly::{monthly_stats, MonthlyStats};

use serde::{Deserialize, Serialize};

use crate::config::EquitySampling;
use crate::domain::{ClosedTrade, Direction, ExitReason};
use crate::ledger::{EquityPoint, LedgerReport};

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Which equity points the drawdown was measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownBasis {
    /// Every candle, marked to market: exact.
    AllCandles,
    /// Trade-closing events only: an approximation that misses open-trade dips.
    TradeCloses,
}

impl From<EquitySampling> for DrawdownBasis {
    fn from(sampling: EquitySampling) -> Self {
        match sampling {
            EquitySampling::PerCandle => Self::AllCandles,
            EquitySampling::PerTrade => Self::TradeCloses,
        }
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winners / total, in [0, 1].
    pub win_rate: f64,
    /// Sum of winning trades' net PnL percent.
    pub gross_profit_percent: f64,
    /// Sum of losing trades' |net PnL percent|.
    pub gross_loss_percent: f64,
    #[serde(with = "crate::serde_float")]
    pub profit_factor: f64,
    pub expectancy_percent: f64,
    pub avg_win_percent: f64,
    pub avg_loss_percent: f64,
    pub total_return_percent: f64,
    pub net_profit: f64,
    pub final_equity: f64,
    pub max_drawdown_percent: f64,
    pub drawdown_basis: DrawdownBasis,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_bars_held: f64,
    pub long_trades: usize,
    pub short_trades: usize,
    pub long_win_rate: f64,
    pub short_win_rate: f64,
    pub reentry_trades: usize,
    pub reentry_win_rate: f64,
    pub stop_loss_exits: usize,
    pub take_profit_exits: usize,
    pub total_commission: f64,
    pub capital_exhausted: bool,
    pub capital_exhausted_at: Option<usize>,
    pub level_accuracy: Vec<LevelAccuracy>,
    pub monthly: Vec<MonthlyStats>,
}

impl RunMetrics {
    pub fn compute(trades: &[ClosedTrade], ledger: &LedgerReport) -> Self {
        let curve = &ledger.equity_curve;
        let net: Vec<f64> = trades.iter().map(|t| t.accounting.net_pnl_percent).collect();
        let winners = trades.iter().filter(|t| t.is_winner()).count();
        let (long_trades, long_win_rate) = side_stats(trades, Direction::Long);
        let (short_trades, short_win_rate) = side_stats(trades, Direction::Short);
        let reentries: Vec<&ClosedTrade> = trades.iter().filter(|t| t.is_reentry).collect();

        Self {
            total_trades: trades.len(),
            winning_trades: winners,
            losing_trades: trades.len() - winners,
            win_rate: win_rate(trades),
            gross_profit_percent: gross_profit(&net),
            gross_loss_percent: gross_loss(&net),
            profit_factor: profit_factor(&net),
            expectancy_percent: mean(&net),
            avg_win_percent: mean(&net.iter().copied().filter(|v| *v > 0.0).collect::<Vec<_>>()),
            avg_loss_percent: mean(&net.iter().copied().filter(|v| *v <= 0.0).collect::<Vec<_>>()),
            total_return_percent: total_return_percent(ledger.initial_capital, ledger.final_equity),
            net_profit: ledger.final_equity - ledger.initial_capital,
            final_equity: ledger.final_equity,
            max_drawdown_percent: max_drawdown_percent(curve),
            drawdown_basis: ledger.sampling.into(),
            sharpe: sharpe_ratio(curve),
            sortino: sortino_ratio(curve),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_bars_held: mean(&trades.iter().map(|t| t.bars_held as f64).collect::<Vec<_>>()),
            long_trades,
            short_trades,
            long_win_rate,
            short_win_rate,
            reentry_trades: reentries.len(),
            reentry_win_rate: ratio(
                reentries.iter().filter(|t| t.is_winner()).count(),
                reentries.len(),
            ),
            stop_loss_exits: count_reason(trades, ExitReason::StopLoss),
            take_profit_exits: count_reason(trades, ExitReason::LastTpLevel),
            total_commission: ledger.total_commission,
            capital_exhausted: ledger.capital_exhausted_at.is_some(),
            capital_exhausted_at: ledger.capital_exhausted_at,
            level_accuracy: level_accuracy(trades),
            monthly: monthly_stats(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Fraction of trades with positive net PnL.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    ratio(trades.iter().filter(|t| t.is_winner()).count(), trades.len())
}

pub fn gross_profit(net_pnl: &[f64]) -> f64 {
    net_pnl.iter().filter(|v| **v > 0.0).sum()
}

pub fn gross_loss(net_pnl: &[f64]) -> f64 {
    net_pnl.iter().filter(|v| **v < 0.0).map(|v| v.abs()).sum()
}

/// Gross profit / gross loss.
///
/// `+∞` when there are no losses but some profit; `0` when both are zero.
pub fn profit_factor(net_pnl: &[f64]) -> f64 {
    let profit = gross_profit(net_pnl);
    let loss = gross_loss(net_pnl);
    if loss == 0.0 {
        return if profit > 0.0 { f64::INFINITY } else { 0.0 };
    }
    profit / loss
}

pub fn total_return_percent(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_equity - initial) / initial * 100.0
}

/// Largest peak-to-trough drop over every point of the curve, in percent.
pub fn max_drawdown_percent(curve: &[EquityPoint]) -> f64 {
    curve
        .iter()
        .map(|p| p.drawdown_percent)
        .fold(0.0, f64::max)
}

/// Annualized Sharpe ratio of per-point equity returns.
///
/// Periods per year come from the median spacing of the curve's timestamps.
/// Returns 0.0 with fewer than two returns or zero variance.
pub fn sharpe_ratio(curve: &[EquityPoint]) -> f64 {
    let returns = point_returns(curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let sd = std_dev(&returns);
    if sd < 1e-15 {
        return 0.0;
    }
    mean(&returns) / sd * periods_per_year(curve).sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino_ratio(curve: &[EquityPoint]) -> f64 {
    let returns = point_returns(curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    if downside == 0.0 {
        return 0.0;
    }
    let downside_sd = (downside / returns.len() as f64).sqrt();
    if downside_sd < 1e-15 {
        return 0.0;
    }
    mean(&returns) / downside_sd * periods_per_year(curve).sqrt()
}

/// Longest run of winners (`winners = true`) or losers.
pub fn max_consecutive(trades: &[ClosedTrade], winners: bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

// ─── Helpers ────────────────────────────────────────────────────────

fn side_stats(trades: &[ClosedTrade], direction: Direction) -> (usize, f64) {
    let side: Vec<&ClosedTrade> = trades.iter().filter(|t| t.direction == direction).collect();
    let wins = side.iter().filter(|t| t.is_winner()).count();
    (side.len(), ratio(wins, side.len()))
}

fn count_reason(trades: &[ClosedTrade], reason: ExitReason) -> usize {
    trades.iter().filter(|t| t.exit_reason == reason).count()
}

fn point_returns(curve: &[EquityPoint]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                (w[1].equity - w[0].equity) / w[0].equity
            } else {
                0.0
            }
        })
        .collect()
}

fn periods_per_year(curve: &[EquityPoint]) -> f64 {
    let mut spacings: Vec<i64> = curve
        .windows(2)
        .map(|w| (w[1].time - w[0].time).num_seconds())
        .filter(|s| *s > 0)
        .collect();
    if spacings.is_empty() {
        return 0.0;
    }
    spacings.sort_unstable();
    let median = spacings[spacings.len() / 2] as f64;
    SECONDS_PER_YEAR / median
}

pub(crate) fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
