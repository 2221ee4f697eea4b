//! Signal gate — one directional entry signal per trend flip, vetoed by the
//! confirmation filters.
//!
//! Blocked signals are kept in the output: they never open positions, but the
//! record of which filters blocked them (and why) is part of the run result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::{flip_indices, ChannelState};
use crate::domain::{Candle, Direction};
use crate::filters::{FilterVerdict, SignalFilter};
use crate::indicators::IndicatorValues;

/// One filter's veto on a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterBlock {
    pub filter: String,
    pub reason: String,
}

/// What the lifecycle engine did with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOutcome {
    /// Opened a fresh position.
    Opened,
    /// Opened a same-direction position after a qualifying close.
    OpenedReentry,
    /// A position was already open.
    IgnoredPositionOpen,
    /// Same direction as the last closed trade, and re-entry did not apply.
    IgnoredReentryNotPermitted,
    /// Vetoed by at least one filter.
    Blocked,
}

impl SignalOutcome {
    pub fn opened(self) -> bool {
        matches!(self, Self::Opened | Self::OpenedReentry)
    }
}

/// A trend flip converted into a proposed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub direction: Direction,
    pub allowed: bool,
    pub blocking_filters: Vec<FilterBlock>,
    /// Filled in once the lifecycle engine has seen the signal.
    pub outcome: Option<SignalOutcome>,
}

/// Emit one signal per trend flip and run every filter on it.
pub fn generate(
    candles: &[Candle],
    channel: &[ChannelState],
    filters: &[Box<dyn SignalFilter>],
    indicators: &IndicatorValues,
) -> Vec<Signal> {
    flip_indices(channel)
        .into_iter()
        .filter_map(|index| {
            let direction = channel[index].trend.direction()?;
            let time = candles.get(index)?.timestamp;
            Some(evaluate(index, time, direction, candles, filters, indicators))
        })
        .collect()
}

fn evaluate(
    index: usize,
    time: DateTime<Utc>,
    direction: Direction,
    candles: &[Candle],
    filters: &[Box<dyn SignalFilter>],
    indicators: &IndicatorValues,
) -> Signal {
    let blocking_filters: Vec<FilterBlock> = filters
        .iter()
        .filter_map(|filter| match filter.evaluate(index, direction, candles, indicators) {
            FilterVerdict::Passed => None,
            FilterVerdict::Blocked(reason) => Some(FilterBlock {
                filter: filter.name().to_string(),
                reason,
            }),
        })
        .collect();

    let allowed = blocking_filters.is_empty();
    Signal {
        index,
        time,
        direction,
        allowed,
        blocking_filters,
        outcome: (!allowed).then_some(SignalOutcome::Blocked),
    }
}
