//! Supertrend bands.
//!
//! Inherently sequential: the upper band may only fall while the previous
//! close stayed at or below it, and the lower band may only rise while the
//! previous close stayed at or above it. A close through a band resets it to
//! the basic value.

use super::Bands;
use crate::domain::Candle;

pub(crate) fn bands(candles: &[Candle], atr: &[f64], multiplier: f64) -> Bands {
    let n = candles.len();
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];

    for i in 0..n {
        if atr[i].is_nan() {
            continue;
        }
        let hl2 = candles[i].hl2();
        let basic_upper = hl2 + multiplier * atr[i];
        let basic_lower = hl2 - multiplier * atr[i];

        if i == 0 || upper[i - 1].is_nan() {
            upper[i] = basic_upper;
            lower[i] = basic_lower;
            continue;
        }

        let prev_close = candles[i - 1].close;
        upper[i] = if prev_close <= upper[i - 1] {
            basic_upper.min(upper[i - 1])
        } else {
            basic_upper
        };
        lower[i] = if prev_close >= lower[i - 1] {
            basic_lower.max(lower[i - 1])
        } else {
            basic_lower
        };
    }

    Bands { upper, lower }
}
