//! Direction filter — restricts entries to one side of the market.

use super::{FilterVerdict, SignalFilter};
use crate::config::TradingMode;
use crate::domain::{Candle, Direction};
use crate::indicators::{Indicator, IndicatorValues};

#[derive(Debug, Clone, Copy)]
pub struct DirectionFilter {
    mode: TradingMode,
}

impl DirectionFilter {
    pub fn new(mode: TradingMode) -> Self {
        Self { mode }
    }
}

impl SignalFilter for DirectionFilter {
    fn name(&self) -> &str {
        "direction"
    }

    fn required_indicators(&self) -> Vec<Box<dyn Indicator>> {
        Vec::new()
    }

    fn evaluate(
        &self,
        _index: usize,
        direction: Direction,
        _candles: &[Candle],
        _indicators: &IndicatorValues,
    ) -> FilterVerdict {
        match (self.mode, direction) {
            (TradingMode::LongOnly, Direction::Short) => {
                FilterVerdict::Blocked("short entries disabled (long_only)".into())
            }
            (TradingMode::ShortOnly, Direction::Long) => {
                FilterVerdict::Blocked("long entries disabled (short_only)".into())
            }
            _ => FilterVerdict::Passed,
        }
    }
}
