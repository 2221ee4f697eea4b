//! Participation filter — volume must reach a multiple of its moving average.

use super::{undefined, FilterVerdict, SignalFilter};
use crate::config::ParticipationFilterConfig;
use crate::domain::{Candle, Direction};
use crate::indicators::{Indicator, IndicatorValues, Sma};

#[derive(Debug, Clone)]
pub struct ParticipationFilter {
    config: ParticipationFilterConfig,
    key: String,
}

impl ParticipationFilter {
    pub fn new(config: ParticipationFilterConfig) -> Self {
        Self {
            config,
            key: format!("volume_sma_{}", config.volume_period),
        }
    }
}

impl SignalFilter for ParticipationFilter {
    fn name(&self) -> &str {
        "participation"
    }

    fn required_indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Sma::of_volume(self.config.volume_period))]
    }

    fn evaluate(
        &self,
        index: usize,
        _direction: Direction,
        candles: &[Candle],
        indicators: &IndicatorValues,
    ) -> FilterVerdict {
        let Some(average) = indicators.defined(&self.key, index) else {
            return undefined(&self.key, index);
        };
        let Some(volume) = candles.get(index).map(|c| c.volume) else {
            return undefined("volume", index);
        };

        let required = self.config.min_ratio * average;
        if volume >= required {
            FilterVerdict::Passed
        } else {
            FilterVerdict::Blocked(format!(
                "volume {volume:.2} below {}x average {average:.2}",
                self.config.min_ratio
            ))
        }
    }
}
