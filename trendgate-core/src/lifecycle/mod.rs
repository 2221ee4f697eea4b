//! Trade lifecycle engine — the per-position state machine.
//!
//! States: `NO_POSITION → OPEN → (PARTIALLY_CLOSED)* → CLOSED`. At most one
//! position is live at any index. Each candle is processed in a fixed order:
//!
//! 1. Entry (only with no position open, on an allowed signal at this index)
//! 2. Take-profit check (gap-through of several levels allowed)
//! 3. Stop trailing update
//! 4. Stop-loss check
//! 5. Full take-profit close
//!
//! Entry fills at the signal bar's close, so steps 2–5 start on the bar after
//! entry. Because entry is evaluated before any exit, a position closed on bar
//! `t` can only be followed by a new one on bar `t + 1` or later.

pub mod ladder;
pub mod reentry;
pub mod stop;

pub use reentry::{Admission, ReentryGate};
pub use stop::{initial_stop, policy_for, StopPolicy};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::ChannelState;
use crate::config::StrategyParams;
use crate::domain::{
    Candle, ClosedTrade, Direction, ExitFill, ExitKind, ExitReason, OpenTrade, Position,
};
use crate::signal::{Signal, SignalOutcome};

/// Ordered record of everything the engine did, consumed by the capital ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TradeEvent {
    Opened {
        trade_id: usize,
        index: usize,
        direction: Direction,
        entry_price: f64,
        is_reentry: bool,
    },
    /// A full or partial exit.
    Filled { trade_id: usize, fill: ExitFill },
    StopMoved {
        trade_id: usize,
        index: usize,
        from: f64,
        to: f64,
    },
    Closed {
        trade_id: usize,
        index: usize,
        reason: ExitReason,
    },
}

impl TradeEvent {
    pub fn index(&self) -> usize {
        match self {
            Self::Opened { index, .. } | Self::StopMoved { index, .. } | Self::Closed { index, .. } => {
                *index
            }
            Self::Filled { fill, .. } => fill.index,
        }
    }
}

/// Everything the engine produces for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleOutput {
    /// Closed trades in closing order (which is also opening order).
    pub closed_trades: Vec<ClosedTrade>,
    /// The position still open when the series ended, if any.
    pub open_trade: Option<OpenTrade>,
    /// Outcome per input signal, index-aligned with the signal slice.
    pub signal_outcomes: Vec<SignalOutcome>,
    pub events: Vec<TradeEvent>,
}

struct LivePosition {
    trade_id: usize,
    position: Position,
}

/// Drives one position at a time through the candle series.
pub struct LifecycleEngine<'a> {
    params: &'a StrategyParams,
    stop_policy: &'static dyn StopPolicy,
    reentry: ReentryGate,
    live: Option<LivePosition>,
    next_trade_id: usize,
    output: LifecycleOutput,
}

impl<'a> LifecycleEngine<'a> {
    /// `params` must already be validated.
    pub fn new(params: &'a StrategyParams) -> Self {
        Self {
            params,
            stop_policy: policy_for(params.stop_mode),
            reentry: ReentryGate::new(params.reentry),
            live: None,
            next_trade_id: 0,
            output: LifecycleOutput::default(),
        }
    }

    /// Process the whole series. `channel` is index-aligned with `candles`;
    /// `signals` must be sorted by index.
    pub fn run(
        mut self,
        candles: &[Candle],
        channel: &[ChannelState],
        signals: &[Signal],
    ) -> LifecycleOutput {
        self.output.signal_outcomes = signals
            .iter()
            .map(|s| s.outcome.unwrap_or(SignalOutcome::Blocked))
            .collect();

        let mut next_signal = 0;
        for (index, candle) in candles.iter().enumerate() {
            while next_signal < signals.len() && signals[next_signal].index < index {
                next_signal += 1;
            }
            while next_signal < signals.len() && signals[next_signal].index == index {
                let mid = channel.get(index).map_or(f64::NAN, |s| s.mid);
                let outcome = self.on_signal(&signals[next_signal], candle, mid);
                self.output.signal_outcomes[next_signal] = outcome;
                next_signal += 1;
            }
            self.on_candle(index, candle);
        }

        if let (Some(live), Some(last)) = (self.live.take(), candles.last()) {
            let mark_index = candles.len() - 1;
            let marked_pnl_percent = live.position.marked_weighted_pnl_percent(last.close);
            self.output.open_trade = Some(OpenTrade {
                position: live.position,
                mark_index,
                mark_price: last.close,
                marked_pnl_percent,
            });
        }

        self.output
    }

    /// Step 1: entry.
    fn on_signal(&mut self, signal: &Signal, candle: &Candle, mid: f64) -> SignalOutcome {
        if !signal.allowed {
            return SignalOutcome::Blocked;
        }
        if self.live.is_some() {
            return SignalOutcome::IgnoredPositionOpen;
        }

        let is_reentry = match self.reentry.admit(signal.direction) {
            Admission::Fresh => false,
            Admission::Reentry => true,
            Admission::Denied => return SignalOutcome::IgnoredReentryNotPermitted,
        };

        self.open(signal.index, signal.direction, candle, mid, is_reentry);
        if is_reentry {
            SignalOutcome::OpenedReentry
        } else {
            SignalOutcome::Opened
        }
    }

    fn open(&mut self, index: usize, direction: Direction, candle: &Candle, mid: f64, is_reentry: bool) {
        let params = self.params;
        let entry_price = candle.close;
        let stop_price = initial_stop(
            direction,
            entry_price,
            params.stop_percent,
            params.stop_baseline,
            mid,
        );
        let position = Position {
            direction,
            entry_index: index,
            entry_time: candle.timestamp,
            entry_price,
            remaining_size_fraction: 1.0,
            stop_price,
            initial_stop_price: stop_price,
            stop_mode: params.stop_mode,
            tp_ladder: ladder::build(direction, entry_price, &params.tp_ladder),
            is_reentry,
            exits: Vec::new(),
        };

        let trade_id = self.next_trade_id;
        self.next_trade_id += 1;
        debug!(
            trade_id,
            index,
            ?direction,
            entry_price,
            stop_price,
            is_reentry,
            "position opened"
        );
        self.output.events.push(TradeEvent::Opened {
            trade_id,
            index,
            direction,
            entry_price,
            is_reentry,
        });
        self.live = Some(LivePosition { trade_id, position });
    }

    /// Steps 2–5 for a position opened on an earlier bar.
    fn on_candle(&mut self, index: usize, candle: &Candle) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        if live.position.entry_index >= index {
            return;
        }
        let trade_id = live.trade_id;
        let position = &mut live.position;
        let fills_before = position.exits.len();

        // 2. Take-profit check.
        let hits = ladder::take_profits(position, index, candle);

        // 3. Trailing update.
        if hits > 0 {
            let to = self.stop_policy.trail(position);
            let from = position.stop_price;
            if to != from {
                position.stop_price = to;
                self.output.events.push(TradeEvent::StopMoved {
                    trade_id,
                    index,
                    from,
                    to,
                });
            }
        }

        // 4. Stop-loss check.
        let mut reason = None;
        if !position.is_closed() && position.stop_touched(candle.high, candle.low) {
            let price = position.stop_price;
            position.exits.push(ExitFill {
                index,
                time: candle.timestamp,
                price,
                size_fraction: position.remaining_size_fraction,
                pnl_percent: position.direction.move_percent(position.entry_price, price),
                kind: ExitKind::StopLoss,
            });
            position.remaining_size_fraction = 0.0;
            reason = Some(ExitReason::StopLoss);
        }

        // 5. Full take-profit.
        if reason.is_none() && position.is_closed() {
            reason = Some(ExitReason::LastTpLevel);
        }

        for fill in &position.exits[fills_before..] {
            self.output.events.push(TradeEvent::Filled {
                trade_id,
                fill: fill.clone(),
            });
        }

        if let Some(reason) = reason {
            self.close(index, reason);
        }
    }

    fn close(&mut self, index: usize, reason: ExitReason) {
        let Some(live) = self.live.take() else {
            return;
        };
        let trade = ClosedTrade::from_position(live.trade_id, &live.position, reason);
        debug!(
            trade_id = live.trade_id,
            index,
            ?reason,
            exit_price = trade.exit_price,
            weighted_pnl_percent = trade.weighted_pnl_percent,
            "position closed"
        );
        self.reentry.record_close(trade.direction, reason);
        self.output.events.push(TradeEvent::Closed {
            trade_id: live.trade_id,
            index,
            reason,
        });
        self.output.closed_trades.push(trade);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReentryConfig, StopMode, TpLevelSpec};
    use crate::domain::Trend;
    use crate::indicators::make_ohlc_candles;

    fn signal(index: usize, direction: Direction, candles: &[Candle]) -> Signal {
        Signal {
            index,
            time: candles[index].timestamp,
            direction,
            allowed: true,
            blocking_filters: Vec::new(),
            outcome: None,
        }
    }

    fn channel(n: usize) -> Vec<ChannelState> {
        vec![
            ChannelState {
                trend: Trend::Flat,
                ..ChannelState::undefined()
            };
            n
        ]
    }

    #[test]
    fn entry_bar_is_not_checked_for_exits() {
        // The entry bar's own range covers both TP and stop.
        let candles = make_ohlc_candles(&[
            (100.0, 110.0, 90.0, 100.0),
            (100.0, 100.5, 99.5, 100.0),
        ]);
        let params = StrategyParams::default();
        let signals = vec![signal(0, Direction::Long, &candles)];
        let out = LifecycleEngine::new(&params).run(&candles, &channel(2), &signals);
        assert!(out.closed_trades.is_empty());
        assert!(out.open_trade.is_some());
        assert_eq!(out.signal_outcomes, vec![SignalOutcome::Opened]);
    }

    #[test]
    fn second_signal_while_open_is_ignored() {
        let candles = make_ohlc_candles(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 100.5, 99.5, 100.0),
        ]);
        let params = StrategyParams::default();
        let signals = vec![
            signal(0, Direction::Long, &candles),
            signal(2, Direction::Short, &candles),
        ];
        let out = LifecycleEngine::new(&params).run(&candles, &channel(3), &signals);
        assert_eq!(
            out.signal_outcomes,
            vec![SignalOutcome::Opened, SignalOutcome::IgnoredPositionOpen]
        );
    }

    #[test]
    fn open_trade_is_marked_to_last_close() {
        let candles = make_ohlc_candles(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 101.5, 99.5, 101.0),
        ]);
        let params = StrategyParams::default();
        let signals = vec![signal(0, Direction::Long, &candles)];
        let out = LifecycleEngine::new(&params).run(&candles, &channel(2), &signals);
        let open = out.open_trade.unwrap();
        assert_eq!(open.mark_index, 1);
        assert!((open.marked_pnl_percent - 1.0).abs() < 1e-9);
    }

    #[test]
    fn breakeven_stop_can_fill_on_the_tp_bar() {
        // TP1 at 101 hit, stop moves to 100, bar low 99.8 touches it.
        let candles = make_ohlc_candles(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 101.2, 99.8, 100.5),
        ]);
        let params = StrategyParams {
            tp_ladder: vec![TpLevelSpec::new(1.0, 50.0), TpLevelSpec::new(3.0, 50.0)],
            stop_mode: StopMode::Breakeven,
            ..StrategyParams::default()
        };
        let signals = vec![signal(0, Direction::Long, &candles)];
        let out = LifecycleEngine::new(&params).run(&candles, &channel(2), &signals);
        let trade = &out.closed_trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.final_exit_price, 100.0);
        assert!((trade.weighted_pnl_percent - 0.5).abs() < 1e-9);
    }

    #[test]
    fn same_direction_signal_after_close_is_denied_without_reentry() {
        let candles = make_ohlc_candles(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 100.5, 93.0, 93.5),
            (93.5, 94.0, 93.0, 93.5),
        ]);
        let params = StrategyParams {
            reentry: ReentryConfig {
                enabled: false,
                ..ReentryConfig::default()
            },
            ..StrategyParams::default()
        };
        let signals = vec![
            signal(0, Direction::Long, &candles),
            signal(2, Direction::Long, &candles),
        ];
        let out = LifecycleEngine::new(&params).run(&candles, &channel(3), &signals);
        assert_eq!(out.closed_trades.len(), 1);
        assert_eq!(
            out.signal_outcomes[1],
            SignalOutcome::IgnoredReentryNotPermitted
        );
        assert!(out.open_trade.is_none());
    }

    #[test]
    fn events_are_in_index_order() {
        let candles = make_ohlc_candles(&[
            (100.0, 100.5, 99.5, 100.0),
            (100.0, 102.5, 99.5, 102.0),
            (102.0, 102.5, 101.5, 102.0),
        ]);
        let params = StrategyParams::default();
        let signals = vec![signal(0, Direction::Long, &candles)];
        let out = LifecycleEngine::new(&params).run(&candles, &channel(3), &signals);
        let indices: Vec<usize> = out.events.iter().map(TradeEvent::index).collect();
        assert!(indices.windows(2).all(|w| w[0] <= w[1]));
        assert!(matches!(out.events.last(), Some(TradeEvent::Closed { .. })));
    }
}
