//! Trend confirmation filter — close must sit on the signal's side of an EMA.
//!
//! LONG requires close > EMA, SHORT requires close < EMA.

use super::{undefined, FilterVerdict, SignalFilter};
use crate::config::TrendFilterConfig;
use crate::domain::{Candle, Direction};
use crate::indicators::{Ema, Indicator, IndicatorValues};

#[derive(Debug, Clone)]
pub struct TrendFilter {
    period: usize,
    key: String,
}

impl TrendFilter {
    pub fn new(config: TrendFilterConfig) -> Self {
        Self {
            period: config.ema_period,
            key: format!("ema_{}", config.ema_period),
        }
    }
}

impl SignalFilter for TrendFilter {
    fn name(&self) -> &str {
        "trend"
    }

    fn required_indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Ema::new(self.period))]
    }

    fn evaluate(
        &self,
        index: usize,
        direction: Direction,
        candles: &[Candle],
        indicators: &IndicatorValues,
    ) -> FilterVerdict {
        let Some(ema) = indicators.defined(&self.key, index) else {
            return undefined(&self.key, index);
        };
        let Some(close) = candles.get(index).map(|c| c.close) else {
            return undefined("close", index);
        };

        let confirmed = match direction {
            Direction::Long => close > ema,
            Direction::Short => close < ema,
        };
        if confirmed {
            FilterVerdict::Passed
        } else {
            FilterVerdict::Blocked(format!(
                "close {close:.4} on wrong side of {} {ema:.4}",
                self.key
            ))
        }
    }
}
