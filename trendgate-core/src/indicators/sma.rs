//! Simple Moving Average (SMA) of close or volume.

use super::Indicator;
use crate::domain::Candle;

/// Which candle field the average runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmaSource {
    Close,
    Volume,
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: SmaSource,
    name: String,
}

impl Sma {
    /// SMA of close.
    pub fn new(period: usize) -> Self {
        Self::with_source(period, SmaSource::Close)
    }

    /// SMA of volume, used by the participation filter.
    pub fn of_volume(period: usize) -> Self {
        Self::with_source(period, SmaSource::Volume)
    }

    fn with_source(period: usize, source: SmaSource) -> Self {
        let period = period.max(1);
        let name = match source {
            SmaSource::Close => format!("sma_{period}"),
            SmaSource::Volume => format!("volume_sma_{period}"),
        };
        Self {
            period,
            source,
            name,
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let values: Vec<f64> = match self.source {
            SmaSource::Close => candles.iter().map(|c| c.close).collect(),
            SmaSource::Volume => candles.iter().map(|c| c.volume).collect(),
        };
        rolling_mean(&values, self.period)
    }
}

/// Rolling mean; a window containing NaN yields NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            nan_count += 1;
        } else {
            sum += v;
        }
        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= period && nan_count == 0 {
            result[i] = sum / period as f64;
        }
    }

    result
}
