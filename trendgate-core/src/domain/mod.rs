//! Domain types for TrendGate.

pub mod candle;
pub mod position;
pub mod trade;

pub use candle::{validate_series, Candle};
pub use position::{Direction, Position, TpLevel, Trend};
pub use trade::{
    ClosedTrade, ExitFill, ExitKind, ExitReason, LevelOutcome, OpenTrade, TradeAccounting,
};
