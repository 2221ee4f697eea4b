//! Trend strength filter — passes when ADX >= threshold.
//!
//! Rejects signals in low-ADX (range-bound) environments regardless of direction.

use super::{undefined, FilterVerdict, SignalFilter};
use crate::config::StrengthFilterConfig;
use crate::domain::{Candle, Direction};
use crate::indicators::{Adx, Indicator, IndicatorValues};

#[derive(Debug, Clone)]
pub struct StrengthFilter {
    config: StrengthFilterConfig,
    key: String,
}

impl StrengthFilter {
    pub fn new(config: StrengthFilterConfig) -> Self {
        Self {
            config,
            key: format!("adx_{}", config.adx_period),
        }
    }
}

impl SignalFilter for StrengthFilter {
    fn name(&self) -> &str {
        "strength"
    }

    fn required_indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Adx::new(self.config.adx_period))]
    }

    fn evaluate(
        &self,
        index: usize,
        _direction: Direction,
        _candles: &[Candle],
        indicators: &IndicatorValues,
    ) -> FilterVerdict {
        let Some(adx) = indicators.defined(&self.key, index) else {
            return undefined(&self.key, index);
        };
        if adx >= self.config.min_adx {
            FilterVerdict::Passed
        } else {
            FilterVerdict::Blocked(format!(
                "{} {adx:.2} below minimum {}",
                self.key, self.config.min_adx
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        let filter = StrengthFilter::new(StrengthFilterConfig {
            adx_period: 14,
            min_adx: 25.0,
        });
        let mut iv = IndicatorValues::new();
        iv.insert("adx_14", vec![24.9, 25.0]);
        assert!(!filter.evaluate(0, Direction::Long, &[], &iv).is_passed());
        assert!(filter.evaluate(1, Direction::Short, &[], &iv).is_passed());
    }
}
