//! TrendGate Runner — parameter sweeps and everything around a run.
//!
//! This crate builds on `trendgate-core` to provide:
//! - Parameter grids over any numeric strategy parameter
//! - Parallel sweep optimizer with cancellation, time budget and progress
//! - Deterministic ranking and pluggable scoring
//! - 2-D heatmaps over two swept parameters
//! - Content-addressed run cache
//! - CSV candle loading and JSON/CSV export

pub mod cache;
pub mod data_loader;
pub mod error;
pub mod export;
pub mod grid;
pub mod heatmap;
pub mod ranking;
pub mod score;
pub mod sweep;

pub use cache::{CacheStats, CachedRun, RunCache};
pub use data_loader::{load_candles, read_candles};
pub use error::{ExportError, LoadError, SweepError};
pub use export::{write_run_artifacts, write_sweep_artifacts};
pub use grid::{Assignment, Axis, GridPoint, ParamGrid, SweepParam};
pub use heatmap::{heatmap, Cell, Heatmap};
pub use score::{FitnessMetric, Score, WeightedBlend};
pub use sweep::{
    Evaluation, Optimizer, PointOutcome, StopReason, SweepConfig, SweepEntry, SweepProgress,
    SweepReport,
};
