//! Stop placement and trailing policies.
//!
//! Initial placement and trailing are orthogonal: the baseline only decides
//! where the stop starts, the policy only decides how it moves after
//! take-profit hits. Trailing always derives from the per-trade ladder prices,
//! never from the moving channel.

use crate::config::{StopBaseline, StopMode};
use crate::domain::{Direction, Position};

/// How the stop moves once take-profit levels are hit.
pub trait StopPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Stop price after this bar's take-profit processing.
    fn trail(&self, position: &Position) -> f64;
}

/// Stop never moves after entry.
#[derive(Debug, Clone, Copy)]
pub struct FixedStop;

impl StopPolicy for FixedStop {
    fn name(&self) -> &str {
        "fixed"
    }

    fn trail(&self, position: &Position) -> f64 {
        position.stop_price
    }
}

/// Stop jumps to the entry price once the first level is hit.
#[derive(Debug, Clone, Copy)]
pub struct BreakevenStop;

impl StopPolicy for BreakevenStop {
    fn name(&self) -> &str {
        "breakeven"
    }

    fn trail(&self, position: &Position) -> f64 {
        match position.highest_hit_level() {
            Some(_) => position.entry_price,
            None => position.stop_price,
        }
    }
}

/// After hitting level k the stop sits at the price of level k-1, where
/// level 0 is the entry price. Before any hit it behaves as fixed.
#[derive(Debug, Clone, Copy)]
pub struct CascadeStop;

impl StopPolicy for CascadeStop {
    fn name(&self) -> &str {
        "cascade"
    }

    fn trail(&self, position: &Position) -> f64 {
        match position.highest_hit_level() {
            Some(k) => position.level_price(k - 1),
            None => position.stop_price,
        }
    }
}

pub fn policy_for(mode: StopMode) -> &'static dyn StopPolicy {
    match mode {
        StopMode::Fixed => &FixedStop,
        StopMode::Breakeven => &BreakevenStop,
        StopMode::Cascade => &CascadeStop,
    }
}

/// Initial stop price for a new position.
///
/// With `MidChannel`, the distance is measured from the channel midpoint on
/// the entry bar. If the midpoint is undefined, or the resulting stop would
/// not sit on the losing side of entry, the entry baseline is used instead.
pub fn initial_stop(
    direction: Direction,
    entry_price: f64,
    stop_percent: f64,
    baseline: StopBaseline,
    mid_channel: f64,
) -> f64 {
    let from_entry = direction.offset_price(entry_price, -stop_percent);
    match baseline {
        StopBaseline::Entry => from_entry,
        StopBaseline::MidChannel => {
            if !mid_channel.is_finite() {
                return from_entry;
            }
            let from_mid = direction.offset_price(mid_channel, -stop_percent);
            let losing_side = match direction {
                Direction::Long => from_mid < entry_price,
                Direction::Short => from_mid > entry_price,
            };
            if losing_side {
                from_mid
            } else {
                from_entry
            }
        }
    }
}
