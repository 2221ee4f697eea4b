//! Candle loading from CSV.
//!
//! Expected header: `timestamp,open,high,low,close,volume` (`datetime`,
//! `date` and `time` are accepted for the first column; `volume` may be
//! omitted and defaults to 0). Timestamps may be RFC 3339, epoch seconds,
//! epoch milliseconds, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`, all read as UTC.
//!
//! Every loaded series is validated before it is returned, so a caller never
//! holds candles the pipeline would reject.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;
use trendgate_core::domain::{validate_series, Candle};

use crate::error::LoadError;

/// Epoch values above this are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(alias = "datetime", alias = "date", alias = "time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Load and validate a candle series from a CSV file.
pub fn load_candles(path: impl AsRef<Path>) -> Result<Vec<Candle>, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let candles = read_candles(file)?;
    debug!(path = %path.display(), candles = candles.len(), "loaded candles");
    Ok(candles)
}

/// Load and validate a candle series from any CSV source.
pub fn read_candles<R: Read>(source: R) -> Result<Vec<Candle>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut candles = Vec::new();
    for (row_idx, result) in reader.deserialize::<RawRow>().enumerate() {
        let raw = result?;
        let timestamp = parse_timestamp(&raw.timestamp).ok_or_else(|| LoadError::InvalidRow {
            row: row_idx + 1,
            reason: format!("unrecognized timestamp '{}'", raw.timestamp),
        })?;
        candles.push(Candle {
            timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        });
    }

    validate_series(&candles)?;
    Ok(candles)
}

/// Parse one timestamp cell in any of the accepted formats.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(epoch) = text.parse::<i64>() {
        return if epoch.abs() > EPOCH_MILLIS_THRESHOLD {
            Utc.timestamp_millis_opt(epoch).single()
        } else {
            Utc.timestamp_opt(epoch, 0).single()
        };
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
