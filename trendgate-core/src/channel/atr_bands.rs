//! ATR bands: hl2 ± multiplier·ATR, independent per bar.

use super::Bands;
use crate::domain::Candle;

pub(crate) fn bands(candles: &[Candle], atr: &[f64], multiplier: f64) -> Bands {
    let (upper, lower) = candles
        .iter()
        .zip(atr)
        .map(|(candle, &atr)| {
            if atr.is_nan() {
                (f64::NAN, f64::NAN)
            } else {
                let mid = candle.hl2();
                (mid + multiplier * atr, mid - multiplier * atr)
            }
        })
        .unzip();
    Bands { upper, lower }
}
