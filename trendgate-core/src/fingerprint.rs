//! Run fingerprinting — deterministic content hashes of (candle series, parameters).
//!
//! Used as cache keys by the optimizer. The pipeline itself never reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::StrategyParams;
use crate::domain::Candle;

/// Content hash of a candle series (every timestamp and OHLCV value).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesHash(pub String);

impl SeriesHash {
    pub fn of(candles: &[Candle]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(candles.len() as u64).to_le_bytes());
        for candle in candles {
            hasher.update(&candle.timestamp.timestamp_millis().to_le_bytes());
            for value in [
                candle.open,
                candle.high,
                candle.low,
                candle.close,
                candle.volume,
            ] {
                hasher.update(&value.to_bits().to_le_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for SeriesHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one pipeline run: series hash + canonical parameter JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunFingerprint(pub String);

impl RunFingerprint {
    pub fn new(series: &SeriesHash, params: &StrategyParams) -> Self {
        // Struct fields serialize in declaration order, so the JSON is canonical.
        let canonical =
            serde_json::to_vec(params).unwrap_or_else(|_| format!("{params:?}").into_bytes());
        let mut hasher = blake3::Hasher::new();
        hasher.update(series.0.as_bytes());
        hasher.update(b"|");
        hasher.update(&canonical);
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn of(candles: &[Candle], params: &StrategyParams) -> Self {
        Self::new(&SeriesHash::of(candles), params)
    }

    /// First 12 hex characters, for logs.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for RunFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    #[test]
    fn fingerprint_is_deterministic() {
        let candles = make_candles(&[100.0, 101.0, 102.0]);
        let params = StrategyParams::default();
        assert_eq!(
            RunFingerprint::of(&candles, &params),
            RunFingerprint::of(&candles, &params)
        );
    }

    #[test]
    fn any_parameter_change_changes_fingerprint() {
        let candles = make_candles(&[100.0, 101.0, 102.0]);
        let a = StrategyParams::default();
        let b = StrategyParams {
            multiplier: 3.5,
            ..StrategyParams::default()
        };
        assert_ne!(RunFingerprint::of(&candles, &a), RunFingerprint::of(&candles, &b));
    }

    #[test]
    fn any_candle_change_changes_series_hash() {
        let a = make_candles(&[100.0, 101.0, 102.0]);
        let mut b = a.clone();
        b[1].volume += 1.0;
        assert_ne!(SeriesHash::of(&a), SeriesHash::of(&b));
        assert_eq!(SeriesHash::of(&a).0.len(), 64);
    }

    #[test]
    fn short_form_is_prefix() {
        let fp = RunFingerprint::of(&make_candles(&[1.0]), &StrategyParams::default());
        assert!(fp.0.starts_with(fp.short()));
        assert_eq!(fp.short().len(), 12);
    }
}
