//! Volatility filter — ATR as a percent of close must sit inside a band.
//!
//! Too quiet and the channel whipsaws; too wild and the stop is noise.

use super::{undefined, FilterVerdict, SignalFilter};
use crate::config::VolatilityFilterConfig;
use crate::domain::{Candle, Direction};
use crate::indicators::{Atr, Indicator, IndicatorValues};

#[derive(Debug, Clone)]
pub struct VolatilityFilter {
    config: VolatilityFilterConfig,
    key: String,
}

impl VolatilityFilter {
    pub fn new(config: VolatilityFilterConfig) -> Self {
        Self {
            config,
            key: format!("atr_{}", config.atr_period),
        }
    }
}

impl SignalFilter for VolatilityFilter {
    fn name(&self) -> &str {
        "volatility"
    }

    fn required_indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Atr::new(self.config.atr_period))]
    }

    fn evaluate(
        &self,
        index: usize,
        _direction: Direction,
        candles: &[Candle],
        indicators: &IndicatorValues,
    ) -> FilterVerdict {
        let Some(atr) = indicators.defined(&self.key, index) else {
            return undefined(&self.key, index);
        };
        let close = match candles.get(index) {
            Some(c) if c.close > 0.0 => c.close,
            _ => return undefined("close", index),
        };

        let atr_pct = atr / close * 100.0;
        if atr_pct < self.config.min_percent {
            FilterVerdict::Blocked(format!(
                "ATR {atr_pct:.3}% below minimum {}%",
                self.config.min_percent
            ))
        } else if atr_pct > self.config.max_percent {
            FilterVerdict::Blocked(format!(
                "ATR {atr_pct:.3}% above maximum {}%",
                self.config.max_percent
            ))
        } else {
            FilterVerdict::Passed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    fn filter() -> VolatilityFilter {
        VolatilityFilter::new(VolatilityFilterConfig {
            atr_period: 3,
            min_percent: 0.5,
            max_percent: 5.0,
        })
    }

    #[test]
    fn inside_band_passes() {
        let candles = make_candles(&[100.0, 100.0]);
        let mut iv = IndicatorValues::new();
        iv.insert("atr_3", vec![f64::NAN, 2.0]);
        assert!(filter().evaluate(1, Direction::Long, &candles, &iv).is_passed());
    }

    #[test]
    fn outside_band_blocks_both_ways() {
        let candles = make_candles(&[100.0, 100.0]);
        let mut iv = IndicatorValues::new();
        iv.insert("atr_3", vec![0.1, 8.0]);
        assert!(!filter().evaluate(0, Direction::Long, &candles, &iv).is_passed());
        assert!(!filter().evaluate(1, Direction::Short, &candles, &iv).is_passed());
    }
}
