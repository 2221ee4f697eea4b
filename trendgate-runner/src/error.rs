//! Error types for the runner layer.

use std::path::PathBuf;

use thiserror::Error;
use trendgate_core::DataError;

/// Errors that abort a sweep or heatmap before any point runs.
///
/// A single grid point failing is not an error here; it becomes a failed
/// entry in the report.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("unknown sweep parameter '{0}'")]
    UnknownParam(String),

    #[error("unknown fitness metric '{0}'")]
    UnknownMetric(String),

    #[error("axis '{0}' has no values")]
    EmptyAxis(String),

    #[error("invalid axis '{param}': {reason}")]
    InvalidAxis { param: String, reason: String },

    #[error("failed to parse grid: {0}")]
    Parse(String),

    #[error("heatmap needs two distinct parameters, got '{0}' twice")]
    SameHeatmapAxis(String),

    #[error("candle series rejected: {0}")]
    Data(#[from] DataError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors from reading candle files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("series rejected: {0}")]
    Data(#[from] DataError),
}

/// Errors from writing results.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output could not be flushed: {0}")]
    Flush(String),
}
