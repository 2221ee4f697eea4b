//! TrendGate Core — the strategy simulation core.
//!
//! This crate contains the deterministic single-run pipeline:
//! - Domain types (candles, positions, closed and open trades)
//! - Trend detector: a volatility-scaled channel and its trend flips
//! - Signal gate with confirmation filters
//! - Trade lifecycle engine: entry, take-profit ladder, trailing stop, re-entry
//! - Capital ledger: leverage, commission, equity curve
//! - Metrics aggregator
//!
//! `pipeline::run` wires them together as a pure function of (candles, params).

pub mod channel;
pub mod config;
pub mod domain;
pub mod error;
pub mod filters;
pub mod fingerprint;
pub mod indicators;
pub mod ledger;
pub mod lifecycle;
pub mod metrics;
pub mod pipeline;
pub mod serde_float;
pub mod signal;
pub mod synthetic;

pub use config::StrategyParams;
pub use error::{ConfigError, DataError, RunError};
pub use pipeline::{run, RunResult};
