//! Position — the single live trade owned by the lifecycle engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trade::ExitFill;
use crate::config::StopMode;

/// Side of a position or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }

    /// Signed percentage move from `from` to `to` in this direction's favour.
    pub fn move_percent(self, from: f64, to: f64) -> f64 {
        if from == 0.0 {
            return 0.0;
        }
        self.sign() * (to - from) / from * 100.0
    }

    /// Price at `percent` away from `base`, in this direction's favour.
    pub fn offset_price(self, base: f64, percent: f64) -> f64 {
        base * (1.0 + self.sign() * percent / 100.0)
    }
}

/// Trend state of the channel at a given candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Long,
    Short,
    Flat,
}

impl Trend {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Long => Some(Direction::Long),
            Self::Short => Some(Direction::Short),
            Self::Flat => None,
        }
    }
}

impl From<Direction> for Trend {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::Long,
            Direction::Short => Self::Short,
        }
    }
}

/// One rung of the take-profit ladder, priced at entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpLevel {
    /// 1-based level number, ascending by distance.
    pub level: usize,
    pub distance_percent: f64,
    pub price: f64,
    pub size_fraction: f64,
    pub hit: bool,
    pub hit_index: Option<usize>,
}

impl TpLevel {
    /// Whether the bar's favourable extreme reaches this level.
    pub fn is_reached(&self, direction: Direction, high: f64, low: f64) -> bool {
        match direction {
            Direction::Long => high >= self.price,
            Direction::Short => low <= self.price,
        }
    }
}

/// The live position. Mutated only by the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    /// Fraction of the original size still open, in (0, 1].
    pub remaining_size_fraction: f64,
    pub stop_price: f64,
    pub initial_stop_price: f64,
    pub stop_mode: StopMode,
    pub tp_ladder: Vec<TpLevel>,
    pub is_reentry: bool,
    pub exits: Vec<ExitFill>,
}

impl Position {
    /// Highest ladder level hit so far (1-based), if any.
    pub fn highest_hit_level(&self) -> Option<usize> {
        self.tp_ladder
            .iter()
            .filter(|level| level.hit)
            .map(|level| level.level)
            .max()
    }

    /// Price of the given 1-based ladder level; level 0 is the entry price.
    pub fn level_price(&self, level: usize) -> f64 {
        if level == 0 {
            return self.entry_price;
        }
        self.tp_ladder
            .iter()
            .find(|l| l.level == level)
            .map_or(self.entry_price, |l| l.price)
    }

    /// Whether the bar's adverse extreme reaches the current stop.
    pub fn stop_touched(&self, high: f64, low: f64) -> bool {
        match self.direction {
            Direction::Long => low <= self.stop_price,
            Direction::Short => high >= self.stop_price,
        }
    }

    /// Size-weighted unleveraged PnL percent of everything exited so far.
    pub fn realized_weighted_pnl_percent(&self) -> f64 {
        self.exits
            .iter()
            .map(|fill| fill.size_fraction * fill.pnl_percent)
            .sum()
    }

    /// Size-weighted PnL percent including the open remainder marked at `price`.
    pub fn marked_weighted_pnl_percent(&self, price: f64) -> f64 {
        self.realized_weighted_pnl_percent()
            + self.remaining_size_fraction
                * self.direction.move_percent(self.entry_price, price)
    }

    pub fn is_closed(&self) -> bool {
        self.remaining_size_fraction <= f64::EPSILON
    }
}
