//! Indicator trait, precomputed value container, and concrete indicators.
//!
//! Indicators are pure functions: candle history in, numeric series out.
//! They are precomputed once before the signal gate runs and queried by
//! candle index afterwards. Warm-up values are `f64::NAN`, never zero.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod rsi;
pub mod sma;

pub use adx::Adx;
pub use atr::{true_range, wilder_smooth, Atr};
pub use ema::Ema;
pub use rsi::Rsi;
pub use sma::{Sma, SmaSource};

use crate::domain::Candle;
use std::collections::HashMap;

/// Trait for indicators.
///
/// # Look-ahead guard
/// No value at index t may depend on candles after t.
pub trait Indicator: Send + Sync {
    /// Unique key, e.g. "rsi_14". Used to share series between filters.
    fn name(&self) -> &str;

    /// Number of candles before the first defined value.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the whole series; output has the same length.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Container for precomputed indicator series, keyed by indicator name.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute every indicator whose key is not already present.
    pub fn compute_all(candles: &[Candle], indicators: &[Box<dyn Indicator>]) -> Self {
        let mut values = Self::new();
        for indicator in indicators {
            if !values.contains(indicator.name()) {
                values.insert(indicator.name(), indicator.compute(candles));
            }
        }
        values
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Value at `index`, or `None` if the series is missing or too short.
    pub fn get(&self, name: &str, index: usize) -> Option<f64> {
        self.series.get(name).and_then(|v| v.get(index).copied())
    }

    /// Defined (non-NaN) value at `index`.
    pub fn defined(&self, name: &str, index: usize) -> Option<f64> {
        self.get(name, index).filter(|v| !v.is_nan())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Synthetic candles from close prices for testing.
///
/// open = previous close (or close for the first candle),
/// high = max(open, close) + 1, low = min(open, close) - 1, volume = 1000,
/// one candle per hour.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Candles from explicit (open, high, low, close) tuples, one per hour.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            timestamp: base + chrono::Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
