//! Candle — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// OHLCV candle for one symbol/timeframe.
///
/// Every derived series (channel, signals, equity) is aligned to the candle
/// series by position, never by timestamp lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Returns true if any price or volume field is non-finite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high bounds open/close, low bounds open/close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.volume >= 0.0
    }

    /// Midpoint of the bar's range.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Check the series invariants every pipeline run relies on.
///
/// Timestamps must be strictly increasing and every candle must be sane.
/// The first violation is reported with its index.
pub fn validate_series(candles: &[Candle]) -> Result<(), DataError> {
    if candles.is_empty() {
        return Err(DataError::Empty);
    }

    for (index, candle) in candles.iter().enumerate() {
        if !candle.is_sane() {
            return Err(DataError::InvalidCandle {
                index,
                reason: describe_insanity(candle),
            });
        }
        if index == 0 {
            continue;
        }
        let previous = candles[index - 1].timestamp;
        if candle.timestamp == previous {
            return Err(DataError::DuplicateTimestamp {
                index,
                timestamp: candle.timestamp,
            });
        }
        if candle.timestamp < previous {
            return Err(DataError::NonMonotonicTimestamp {
                index,
                previous,
                current: candle.timestamp,
            });
        }
    }

    Ok(())
}

fn describe_insanity(candle: &Candle) -> String {
    if candle.is_void() {
        "non-finite price or volume".to_string()
    } else if candle.high < candle.low {
        format!("high {} below low {}", candle.high, candle.low)
    } else if candle.low <= 0.0 {
        format!("non-positive low {}", candle.low)
    } else if candle.volume < 0.0 {
        format!("negative volume {}", candle.volume)
    } else {
        "open/close outside the high-low range".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_candle(hour: u32) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample_candle(0).is_sane());
    }

    #[test]
    fn candle_detects_void() {
        let mut candle = sample_candle(0);
        candle.close = f64::NAN;
        assert!(candle.is_void());
        assert!(!candle.is_sane());
    }

    #[test]
    fn candle_detects_inverted_range() {
        let mut candle = sample_candle(0);
        candle.high = 97.0;
        assert!(!candle.is_sane());
    }

    #[test]
    fn hl2_is_range_midpoint() {
        assert_eq!(sample_candle(0).hl2(), 101.5);
    }

    #[test]
    fn validate_accepts_increasing_series() {
        let candles = vec![sample_candle(0), sample_candle(1), sample_candle(2)];
        assert!(validate_series(&candles).is_ok());
    }

    #[test]
    fn validate_rejects_empty() {
        assert_eq!(validate_series(&[]), Err(DataError::Empty));
    }

    #[test]
    fn validate_reports_duplicate_index() {
        let candles = vec![sample_candle(0), sample_candle(1), sample_candle(1)];
        match validate_series(&candles) {
            Err(DataError::DuplicateTimestamp { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected duplicate timestamp, got {other:?}"),
        }
    }

    #[test]
    fn validate_reports_out_of_order_index() {
        let candles = vec![sample_candle(0), sample_candle(3), sample_candle(2)];
        match validate_series(&candles) {
            Err(DataError::NonMonotonicTimestamp { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected non-monotonic timestamp, got {other:?}"),
        }
    }

    #[test]
    fn validate_reports_insane_candle() {
        let mut bad = sample_candle(1);
        bad.low = 110.0;
        let candles = vec![sample_candle(0), bad];
        match validate_series(&candles) {
            Err(DataError::InvalidCandle { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected invalid candle, got {other:?}"),
        }
    }

    #[test]
    fn candle_serialization_roundtrip() {
        let candle = sample_candle(4);
        let json = serde_json::to_string(&candle).unwrap();
        let deser: Candle = serde_json::from_str(&json).unwrap();
        assert_eq!(candle, deser);
    }
}
