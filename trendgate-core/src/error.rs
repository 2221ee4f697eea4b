//! Error taxonomy for the simulation core.
//!
//! - `ConfigError`: invalid parameter combination, raised before any simulation.
//! - `DataError`: the candle series violates an integrity invariant; the run aborts.
//! - `RunError`: either of the above, returned by the pipeline.
//!
//! Computation boundaries (capital exhaustion, metric sentinels) are not errors:
//! they are reported in-band by the ledger and metrics.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Invalid strategy parameters. The caller can fix the input and retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
    #[error("take-profit ladder must have at least one level")]
    EmptyLadder,
    #[error("take-profit sizes sum to {total_percent}%, which exceeds 100%")]
    LadderOversized { total_percent: f64 },
    #[error(
        "take-profit distances must be strictly ascending: level {level} ({distance}%) \
         does not exceed the previous level ({previous}%)"
    )]
    NonMonotonicLadder {
        level: usize,
        distance: f64,
        previous: f64,
    },
    #[error("take-profit level {level}: {reason}")]
    InvalidLevel { level: usize, reason: String },
    #[error("{filter} filter: {reason}")]
    InvalidFilter {
        filter: &'static str,
        reason: String,
    },
    #[error("date range start {start} is not before end {end}")]
    InvertedDateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("unknown channel kind '{0}'")]
    UnknownChannel(String),
    #[error("failed to parse parameters: {0}")]
    Parse(String),
}

/// The candle series cannot be simulated. No partial result is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("candle series is empty")]
    Empty,
    #[error("duplicate timestamp {timestamp} at index {index}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: DateTime<Utc>,
    },
    #[error("timestamp at index {index} ({current}) is not after the previous one ({previous})")]
    NonMonotonicTimestamp {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    #[error("invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: String },
    #[error("insufficient history: {required} candles required, {available} available")]
    InsufficientHistory { required: usize, available: usize },
    #[error("date range selects no candles")]
    EmptyDateRange,
}

impl DataError {
    /// Index of the offending candle, when the violation is positional.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::DuplicateTimestamp { index, .. }
            | Self::NonMonotonicTimestamp { index, .. }
            | Self::InvalidCandle { index, .. } => Some(*index),
            Self::Empty | Self::InsufficientHistory { .. } | Self::EmptyDateRange => None,
        }
    }
}

/// Errors from a single pipeline run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("data integrity error: {0}")]
    Data(#[from] DataError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_error_exposes_index() {
        let err = DataError::InvalidCandle {
            index: 7,
            reason: "high below low".into(),
        };
        assert_eq!(err.index(), Some(7));
        assert_eq!(DataError::Empty.index(), None);
    }

    #[test]
    fn run_error_wraps_config_error() {
        let err: RunError = ConfigError::EmptyLadder.into();
        assert!(err.to_string().contains("at least one level"));
    }

    #[test]
    fn out_of_range_message_names_field() {
        let err = ConfigError::OutOfRange {
            field: "stop_percent",
            requirement: "in (0, 100)",
            value: -1.0,
        };
        assert_eq!(err.to_string(), "stop_percent must be in (0, 100), got -1");
    }
}
