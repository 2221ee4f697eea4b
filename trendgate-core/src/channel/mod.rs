//! Trend detector — a volatility-scaled channel around price and the trend
//! state derived from it.
//!
//! Channel kinds live in a static table mapping each [`ChannelKind`] to a pure
//! band function. Every kind shares the same trend rule:
//!
//! - the trend flips to LONG when close > the *previous* bar's upper band,
//! - to SHORT when close < the *previous* bar's lower band,
//! - otherwise it holds.
//!
//! Before both previous bands are defined the trend stays FLAT, so the warm-up
//! window never produces a flip. Undefined band values are `f64::NAN`.

mod atr_bands;
mod supertrend;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, Trend};
use crate::error::ConfigError;
use crate::indicators::{Atr, Indicator};

/// Identifier of a channel construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// hl2 ± multiplier·ATR, recomputed every bar.
    #[default]
    AtrBands,
    /// hl2 ± multiplier·ATR with bands that only tighten while price respects them.
    Supertrend,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 2] = [ChannelKind::AtrBands, ChannelKind::Supertrend];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AtrBands => "atr_bands",
            Self::Supertrend => "supertrend",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownChannel(s.to_string()))
    }
}

/// Upper and lower band per candle.
pub(crate) struct Bands {
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

type BandFn = fn(&[Candle], &[f64], f64) -> Bands;

/// Static registry: one pure band function per channel kind.
const REGISTRY: [(ChannelKind, BandFn); 2] = [
    (ChannelKind::AtrBands, atr_bands::bands),
    (ChannelKind::Supertrend, supertrend::bands),
];

fn band_fn(kind: ChannelKind) -> BandFn {
    REGISTRY
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(atr_bands::bands as BandFn, |(_, f)| *f)
}

/// Channel and trend state at one candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    #[serde(with = "crate::serde_float")]
    pub upper_band: f64,
    #[serde(with = "crate::serde_float")]
    pub lower_band: f64,
    /// Midpoint of the two bands; baseline for mid-channel stops.
    #[serde(with = "crate::serde_float")]
    pub mid: f64,
    /// Lower band while LONG, upper band while SHORT, undefined while FLAT.
    #[serde(with = "crate::serde_float")]
    pub active_trend_line: f64,
    pub trend: Trend,
    /// Smoothed true range.
    #[serde(with = "crate::serde_float")]
    pub volatility: f64,
}

impl ChannelState {
    /// State with no defined values, as seen during warm-up.
    pub fn undefined() -> Self {
        Self {
            upper_band: f64::NAN,
            lower_band: f64::NAN,
            mid: f64::NAN,
            active_trend_line: f64::NAN,
            trend: Trend::Flat,
            volatility: f64::NAN,
        }
    }

    pub fn has_bands(&self) -> bool {
        !(self.upper_band.is_nan() || self.lower_band.is_nan())
    }
}

/// Compute the channel and trend for every candle.
pub fn compute(
    kind: ChannelKind,
    candles: &[Candle],
    atr_length: usize,
    multiplier: f64,
) -> Vec<ChannelState> {
    let atr = Atr::new(atr_length).compute(candles);
    let bands = band_fn(kind)(candles, &atr, multiplier);
    let trends = derive_trend(candles, &bands);

    (0..candles.len())
        .map(|i| {
            let upper = bands.upper[i];
            let lower = bands.lower[i];
            let trend = trends[i];
            let active_trend_line = match trend {
                Trend::Long => lower,
                Trend::Short => upper,
                Trend::Flat => f64::NAN,
            };
            ChannelState {
                upper_band: upper,
                lower_band: lower,
                mid: (upper + lower) / 2.0,
                active_trend_line,
                trend,
                volatility: atr[i],
            }
        })
        .collect()
}

fn derive_trend(candles: &[Candle], bands: &Bands) -> Vec<Trend> {
    let mut trends = vec![Trend::Flat; candles.len()];
    for i in 1..candles.len() {
        let prev_upper = bands.upper[i - 1];
        let prev_lower = bands.lower[i - 1];
        let close = candles[i].close;
        let prior = trends[i - 1];

        trends[i] = if prev_upper.is_nan() || prev_lower.is_nan() || close.is_nan() {
            prior
        } else if close > prev_upper {
            Trend::Long
        } else if close < prev_lower {
            Trend::Short
        } else {
            prior
        };
    }
    trends
}

/// Indices where the trend changes to a non-FLAT state.
pub fn flip_indices(states: &[ChannelState]) -> Vec<usize> {
    (1..states.len())
        .filter(|&i| states[i].trend != states[i - 1].trend && states[i].trend != Trend::Flat)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_ohlc_candles;

    /// Flat market, then a sharp rally, then a sharp selloff.
    fn rally_then_selloff() -> Vec<Candle> {
        let mut data = Vec::new();
        for _ in 0..10 {
            data.push((100.0, 101.0, 99.0, 100.0));
        }
        for k in 1..=5 {
            let c = 100.0 + 10.0 * k as f64;
            data.push((c - 5.0, c + 1.0, c - 6.0, c));
        }
        for k in 1..=8 {
            let c = 150.0 - 15.0 * k as f64;
            data.push((c + 8.0, c + 9.0, c - 1.0, c));
        }
        make_ohlc_candles(&data)
    }

    #[test]
    fn warm_up_is_flat_and_undefined() {
        let candles = rally_then_selloff();
        let states = compute(ChannelKind::AtrBands, &candles, 5, 2.0);
        for state in &states[..5] {
            assert!(!state.has_bands());
            assert_eq!(state.trend, Trend::Flat);
            assert!(state.volatility.is_nan());
        }
        assert!(states[5].has_bands());
        // Bands at 5 are defined but the flip rule reads bands at 4.
        assert_eq!(states[5].trend, Trend::Flat);
    }

    #[test]
    fn rally_flips_long_then_selloff_flips_short() {
        let candles = rally_then_selloff();
        let states = compute(ChannelKind::AtrBands, &candles, 5, 1.0);
        let flips = flip_indices(&states);
        assert!(!flips.is_empty());
        assert_eq!(states[flips[0]].trend, Trend::Long);
        assert_eq!(states.last().map(|s| s.trend), Some(Trend::Short));
    }

    #[test]
    fn active_line_follows_trend() {
        let candles = rally_then_selloff();
        for state in compute(ChannelKind::AtrBands, &candles, 5, 1.0) {
            match state.trend {
                Trend::Long => assert_eq!(state.active_trend_line, state.lower_band),
                Trend::Short => assert_eq!(state.active_trend_line, state.upper_band),
                Trend::Flat => assert!(state.active_trend_line.is_nan()),
            }
        }
    }

    #[test]
    fn flip_uses_previous_bar_bands() {
        let candles = rally_then_selloff();
        let states = compute(ChannelKind::AtrBands, &candles, 5, 1.0);
        for i in flip_indices(&states) {
            let prev = &states[i - 1];
            match states[i].trend {
                Trend::Long => assert!(candles[i].close > prev.upper_band),
                Trend::Short => assert!(candles[i].close < prev.lower_band),
                Trend::Flat => unreachable!(),
            }
        }
    }

    #[test]
    fn supertrend_kind_also_flips() {
        let candles = rally_then_selloff();
        let states = compute(ChannelKind::Supertrend, &candles, 5, 1.0);
        assert!(!flip_indices(&states).is_empty());
    }

    #[test]
    fn channel_kind_parses_and_rejects() {
        assert_eq!("supertrend".parse::<ChannelKind>(), Ok(ChannelKind::Supertrend));
        assert_eq!(
            "keltner".parse::<ChannelKind>(),
            Err(ConfigError::UnknownChannel("keltner".into()))
        );
        assert_eq!(ChannelKind::AtrBands.to_string(), "atr_bands");
    }

    #[test]
    fn undefined_state_serializes_nulls() {
        let json = serde_json::to_string(&ChannelState::undefined()).unwrap();
        assert!(json.contains(r#""upper_band":null"#));
        assert!(json.contains(r#""trend":"FLAT""#));
    }
}
