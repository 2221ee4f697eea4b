//! Momentum filter — RSI must not be stretched in the signal's direction.
//!
//! LONG is blocked when RSI >= overbought; SHORT is blocked when RSI <= oversold.

use super::{undefined, FilterVerdict, SignalFilter};
use crate::config::MomentumFilterConfig;
use crate::domain::{Candle, Direction};
use crate::indicators::{Indicator, IndicatorValues, Rsi};

#[derive(Debug, Clone)]
pub struct MomentumFilter {
    config: MomentumFilterConfig,
    key: String,
}

impl MomentumFilter {
    pub fn new(config: MomentumFilterConfig) -> Self {
        Self {
            config,
            key: format!("rsi_{}", config.rsi_period),
        }
    }
}

impl SignalFilter for MomentumFilter {
    fn name(&self) -> &str {
        "momentum"
    }

    fn required_indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Rsi::new(self.config.rsi_period))]
    }

    fn evaluate(
        &self,
        index: usize,
        direction: Direction,
        _candles: &[Candle],
        indicators: &IndicatorValues,
    ) -> FilterVerdict {
        let Some(rsi) = indicators.defined(&self.key, index) else {
            return undefined(&self.key, index);
        };

        match direction {
            Direction::Long if rsi >= self.config.overbought => FilterVerdict::Blocked(format!(
                "{} {rsi:.2} >= overbought {}",
                self.key, self.config.overbought
            )),
            Direction::Short if rsi <= self.config.oversold => FilterVerdict::Blocked(format!(
                "{} {rsi:.2} <= oversold {}",
                self.key, self.config.oversold
            )),
            _ => FilterVerdict::Passed,
        }
    }
}
