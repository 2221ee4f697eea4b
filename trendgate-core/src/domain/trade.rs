//! ClosedTrade — an immutable snapshot emitted when a position closes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::{Direction, Position, TpLevel};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    LastTpLevel,
}

/// What produced an exit fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitKind {
    TakeProfit { level: usize },
    StopLoss,
}

/// A full or partial reduction of the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitFill {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub price: f64,
    /// Fraction of the original position size closed by this fill.
    pub size_fraction: f64,
    /// Unleveraged move from entry to this fill, in percent.
    pub pnl_percent: f64,
    pub kind: ExitKind,
}

/// Per-level record of whether the ladder rung was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelOutcome {
    pub level: usize,
    pub price: f64,
    pub size_fraction: f64,
    pub hit: bool,
    pub hit_index: Option<usize>,
}

impl From<&TpLevel> for LevelOutcome {
    fn from(level: &TpLevel) -> Self {
        Self {
            level: level.level,
            price: level.price,
            size_fraction: level.size_fraction,
            hit: level.hit,
            hit_index: level.hit_index,
        }
    }
}

/// Capital-side view of a trade, filled in by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeAccounting {
    /// Capital committed to the trade at entry.
    pub margin: f64,
    /// Margin × leverage.
    pub notional: f64,
    pub leveraged_pnl_percent: f64,
    /// Commission paid on entry and every exit, as percent of margin.
    pub commission_percent: f64,
    /// Leveraged PnL minus commission, as percent of margin.
    pub net_pnl_percent: f64,
    /// Net PnL in account currency.
    pub net_pnl: f64,
    pub capital_after: f64,
}

/// A complete round trip: entry → final exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub trade_id: usize,
    pub direction: Direction,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    /// Size-weighted average of all exit fills.
    pub exit_price: f64,
    /// Price of the fill that closed the position.
    pub final_exit_price: f64,
    /// Size-weighted unleveraged PnL before commission, in percent.
    pub weighted_pnl_percent: f64,
    pub exit_reason: ExitReason,
    pub per_level_outcomes: Vec<LevelOutcome>,
    pub is_reentry: bool,
    pub exits: Vec<ExitFill>,
    pub bars_held: usize,
    pub accounting: TradeAccounting,
}

impl ClosedTrade {
    /// Snapshot a fully closed position.
    pub fn from_position(trade_id: usize, position: &Position, exit_reason: ExitReason) -> Self {
        let (exit_index, exit_time, final_exit_price) = position
            .exits
            .last()
            .map_or((position.entry_index, position.entry_time, position.entry_price), |f| {
                (f.index, f.time, f.price)
            });

        let exited: f64 = position.exits.iter().map(|f| f.size_fraction).sum();
        let exit_price = if exited > 0.0 {
            position
                .exits
                .iter()
                .map(|f| f.size_fraction * f.price)
                .sum::<f64>()
                / exited
        } else {
            final_exit_price
        };

        Self {
            trade_id,
            direction: position.direction,
            entry_index: position.entry_index,
            exit_index,
            entry_time: position.entry_time,
            exit_time,
            entry_price: position.entry_price,
            exit_price,
            final_exit_price,
            weighted_pnl_percent: position.realized_weighted_pnl_percent(),
            exit_reason,
            per_level_outcomes: position.tp_ladder.iter().map(LevelOutcome::from).collect(),
            is_reentry: position.is_reentry,
            exits: position.exits.clone(),
            bars_held: exit_index.saturating_sub(position.entry_index),
            accounting: TradeAccounting::default(),
        }
    }

    /// A trade wins when it made money after leverage and commission.
    pub fn is_winner(&self) -> bool {
        self.accounting.net_pnl_percent > 0.0
    }

    /// Whether the given 1-based ladder level was reached.
    pub fn reached_level(&self, level: usize) -> bool {
        self.per_level_outcomes
            .iter()
            .any(|outcome| outcome.level == level && outcome.hit)
    }
}

/// A position still open when the candle series ends, marked to the last close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTrade {
    pub position: Position,
    pub mark_index: usize,
    pub mark_price: f64,
    /// Realized plus unrealized size-weighted PnL percent at the mark.
    pub marked_pnl_percent: f64,
}
