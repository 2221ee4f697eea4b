//! The full simulation pipeline as one pure function:
//! candles → channel → signals → lifecycle → ledger → metrics.
//!
//! Single-threaded and deterministic: the same (candles, params) pair always
//! yields an identical `RunResult`. Any configuration or data-integrity
//! violation aborts before simulation and returns no partial result.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::{self, ChannelState};
use crate::config::StrategyParams;
use crate::domain::{validate_series, Candle, ClosedTrade, OpenTrade};
use crate::error::{DataError, RunError};
use crate::filters::{build_filters, compute_indicators};
use crate::ledger::{self, EquityPoint, LedgerReport};
use crate::lifecycle::{LifecycleEngine, TradeEvent};
use crate::metrics::RunMetrics;
use crate::signal::{self, Signal};

/// A candle with its channel overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedCandle {
    #[serde(flatten)]
    pub candle: Candle,
    pub channel: ChannelState,
}

/// Everything one run produces. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Index into the input series of the first simulated candle.
    pub window_start: usize,
    pub candles_with_indicator: Vec<AnnotatedCandle>,
    pub signals: Vec<Signal>,
    pub closed_trades: Vec<ClosedTrade>,
    pub open_trade: Option<OpenTrade>,
    pub events: Vec<TradeEvent>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_capital: f64,
    pub metrics: RunMetrics,
}

/// Run the whole pipeline over `candles` with `params`.
///
/// Series indices in the result are relative to the simulated window; errors
/// from series validation carry indices into the input slice.
pub fn run(candles: &[Candle], params: &StrategyParams) -> Result<RunResult, RunError> {
    params.validate()?;
    validate_series(candles)?;

    let (window_start, window) = select_window(candles, params)?;
    let required = params.min_history();
    if window.len() < required {
        return Err(DataError::InsufficientHistory {
            required,
            available: window.len(),
        }
        .into());
    }

    let channel = channel::compute(params.channel, window, params.atr_length, params.multiplier);
    let filters = build_filters(&params.filters);
    let indicators = compute_indicators(window, &filters);
    let mut signals = signal::generate(window, &channel, &filters, &indicators);

    let lifecycle = LifecycleEngine::new(params).run(window, &channel, &signals);
    for (signal, outcome) in signals.iter_mut().zip(&lifecycle.signal_outcomes) {
        signal.outcome = Some(*outcome);
    }

    let mut closed_trades = lifecycle.closed_trades;
    let report: LedgerReport = ledger::settle(params, window, &lifecycle.events, &mut closed_trades);
    let metrics = RunMetrics::compute(&closed_trades, &report);

    debug!(
        candles = window.len(),
        signals = signals.len(),
        trades = closed_trades.len(),
        open = lifecycle.open_trade.is_some(),
        total_return_percent = metrics.total_return_percent,
        max_drawdown_percent = metrics.max_drawdown_percent,
        "pipeline run complete"
    );

    let candles_with_indicator = window
        .iter()
        .cloned()
        .zip(channel)
        .map(|(candle, channel)| AnnotatedCandle { candle, channel })
        .collect();

    Ok(RunResult {
        window_start,
        candles_with_indicator,
        signals,
        closed_trades,
        open_trade: lifecycle.open_trade,
        events: lifecycle.events,
        equity_curve: report.equity_curve,
        final_capital: report.final_capital,
        metrics,
    })
}

/// Contiguous slice of candles inside the configured date range.
fn select_window<'a>(
    candles: &'a [Candle],
    params: &StrategyParams,
) -> Result<(usize, &'a [Candle]), DataError> {
    let range = params.date_range;
    if range.is_unbounded() {
        return Ok((0, candles));
    }
    let start = candles
        .iter()
        .position(|c| range.contains(c.timestamp))
        .ok_or(DataError::EmptyDateRange)?;
    let len = candles[start..]
        .iter()
        .take_while(|c| range.contains(c.timestamp))
        .count();
    Ok((start, &candles[start..start + len]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DateRange;
    use crate::error::ConfigError;
    use crate::indicators::make_candles;
    use crate::synthetic::{generate, SyntheticConfig};

    #[test]
    fn invalid_params_fail_before_data_checks() {
        let params = StrategyParams {
            stop_percent: -1.0,
            ..StrategyParams::default()
        };
        let err = run(&[], &params).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn non_monotonic_series_aborts_with_index() {
        let mut candles = make_candles(&[100.0; 30]);
        candles.swap(10, 11);
        let err = run(&candles, &StrategyParams::default()).unwrap_err();
        match err {
            RunError::Data(data) => assert_eq!(data.index(), Some(11)),
            other => panic!("expected data error, got {other:?}"),
        }
    }

    #[test]
    fn short_series_is_insufficient_history() {
        let candles = make_candles(&[100.0; 10]);
        let err = run(&candles, &StrategyParams::default()).unwrap_err();
        assert_eq!(
            err,
            RunError::Data(DataError::InsufficientHistory {
                required: 16,
                available: 10
            })
        );
    }

    #[test]
    fn date_range_restricts_window() {
        let candles = generate(&SyntheticConfig {
            candles: 300,
            ..SyntheticConfig::default()
        });
        let params = StrategyParams {
            date_range: DateRange {
                start: Some(candles[100].timestamp),
                end: Some(candles[199].timestamp),
            },
            ..StrategyParams::default()
        };
        let result = run(&candles, &params).unwrap();
        assert_eq!(result.window_start, 100);
        assert_eq!(result.candles_with_indicator.len(), 100);
        assert_eq!(result.equity_curve.len(), 100);
    }

    #[test]
    fn date_range_outside_data_is_empty() {
        let candles = make_candles(&[100.0; 30]);
        let params = StrategyParams {
            date_range: DateRange {
                start: Some(candles[29].timestamp + chrono::Duration::days(1)),
                end: None,
            },
            ..StrategyParams::default()
        };
        assert_eq!(
            run(&candles, &params).unwrap_err(),
            RunError::Data(DataError::EmptyDateRange)
        );
    }

    #[test]
    fn every_signal_gets_an_outcome() {
        let candles = generate(&SyntheticConfig::default());
        let result = run(&candles, &StrategyParams::default()).unwrap();
        assert!(!result.signals.is_empty());
        assert!(result.signals.iter().all(|s| s.outcome.is_some()));
    }
}
