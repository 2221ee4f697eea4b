//! Capital ledger — leverage, commission, and the running capital balance.
//!
//! Replays the lifecycle engine's ordered trade events against a capital
//! balance. Each trade commits `position_size_percent` of the running capital
//! as margin; notional is margin × leverage. Commission is charged on the
//! entry notional and on the notional of every exit fill (scaled by exit/entry
//! price).
//!
//! Capital never goes negative: a loss larger than the balance clamps it to
//! zero, flags the index, and every later trade runs with zero size.
//! Exhaustion is terminal. Fills that arrive afterwards, including those of
//! the position open at the time, move neither capital nor commission.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{EquitySampling, StrategyParams};
use crate::domain::{Candle, ClosedTrade, Direction, ExitFill, TradeAccounting};
use crate::lifecycle::TradeEvent;

/// One point of the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub equity: f64,
    /// Drop from the running peak, in percent.
    pub drawdown_percent: f64,
}

/// What the ledger produced for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub equity_curve: Vec<EquityPoint>,
    pub sampling: EquitySampling,
    pub initial_capital: f64,
    /// Realized capital after the last event (excludes any open position).
    pub final_capital: f64,
    /// Equity at the last candle, including an open position marked to close.
    pub final_equity: f64,
    pub total_commission: f64,
    /// Index of the event that wiped out the balance, if it happened.
    pub capital_exhausted_at: Option<usize>,
}

#[derive(Debug, Clone)]
struct OpenBook {
    trade_id: usize,
    direction: Direction,
    entry_price: f64,
    margin: f64,
    remaining: f64,
    capital_at_entry: f64,
    commission: f64,
    weighted_pnl_percent: f64,
    exit_notional_ratio: f64,
}

/// Running capital state.
#[derive(Debug, Clone)]
pub struct CapitalLedger {
    initial_capital: f64,
    capital: f64,
    leverage: f64,
    commission_rate: f64,
    size_fraction: f64,
    open: Option<OpenBook>,
    commission_paid: f64,
    exhausted_at: Option<usize>,
    accounting: BTreeMap<usize, TradeAccounting>,
}

impl CapitalLedger {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            initial_capital: params.initial_capital,
            capital: params.initial_capital,
            leverage: params.leverage,
            commission_rate: params.commission_percent / 100.0,
            size_fraction: params.position_size_percent / 100.0,
            open: None,
            commission_paid: 0.0,
            exhausted_at: None,
            accounting: BTreeMap::new(),
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    pub fn exhausted_at(&self) -> Option<usize> {
        self.exhausted_at
    }

    /// Accounting of a closed trade, once its `Closed` event has been applied.
    pub fn accounting(&self, trade_id: usize) -> Option<&TradeAccounting> {
        self.accounting.get(&trade_id)
    }

    /// Apply one engine event.
    pub fn apply(&mut self, event: &TradeEvent) {
        match event {
            TradeEvent::Opened {
                trade_id,
                index,
                direction,
                entry_price,
                ..
            } => self.open(*trade_id, *index, *direction, *entry_price),
            TradeEvent::Filled { trade_id, fill } => self.fill(*trade_id, fill),
            TradeEvent::Closed { trade_id, .. } => self.close(*trade_id),
            TradeEvent::StopMoved { .. } => {}
        }
    }

    fn open(&mut self, trade_id: usize, index: usize, direction: Direction, entry_price: f64) {
        let margin = self.capital * self.size_fraction;
        let commission = margin * self.leverage * self.commission_rate;
        let capital_at_entry = self.capital;
        self.commission_paid += commission;
        self.adjust_capital(-commission, index);
        self.open = Some(OpenBook {
            trade_id,
            direction,
            entry_price,
            margin,
            remaining: 1.0,
            capital_at_entry,
            commission,
            weighted_pnl_percent: 0.0,
            exit_notional_ratio: 0.0,
        });
    }

    fn fill(&mut self, trade_id: usize, fill: &ExitFill) {
        let leverage = self.leverage;
        let rate = self.commission_rate;
        let Some(book) = self.open.as_mut().filter(|b| b.trade_id == trade_id) else {
            return;
        };
        let ratio = if book.entry_price > 0.0 {
            fill.price / book.entry_price
        } else {
            1.0
        };
        let realized = book.margin * fill.size_fraction * leverage * fill.pnl_percent / 100.0;
        let commission = book.margin * leverage * fill.size_fraction * ratio * rate;

        book.remaining = (book.remaining - fill.size_fraction).max(0.0);
        book.commission += commission;
        book.weighted_pnl_percent += fill.size_fraction * fill.pnl_percent;
        book.exit_notional_ratio += fill.size_fraction * ratio;

        if self.exhausted_at.is_none() {
            self.commission_paid += commission;
            self.adjust_capital(realized - commission, fill.index);
        }
    }

    fn close(&mut self, trade_id: usize) {
        let Some(book) = self.open.take() else {
            return;
        };
        if book.trade_id != trade_id {
            self.open = Some(book);
            return;
        }

        let leveraged_pnl_percent = self.leverage * book.weighted_pnl_percent;
        let commission_percent =
            self.leverage * self.commission_rate * 100.0 * (1.0 + book.exit_notional_ratio);
        let net_pnl_percent = leveraged_pnl_percent - commission_percent;

        self.accounting.insert(
            trade_id,
            TradeAccounting {
                margin: book.margin,
                notional: book.margin * self.leverage,
                leveraged_pnl_percent,
                commission_percent,
                net_pnl_percent,
                net_pnl: self.capital - book.capital_at_entry,
                capital_after: self.capital,
            },
        );
    }

    fn adjust_capital(&mut self, delta: f64, index: usize) {
        if self.exhausted_at.is_some() {
            return;
        }
        let next = self.capital + delta;
        if next <= 0.0 {
            warn!(index, shortfall = -next, "capital exhausted; later trades run at zero size");
            self.exhausted_at = Some(index);
            self.capital = 0.0;
        } else {
            self.capital = next;
        }
    }

    /// Capital plus the open position marked at `price`, never negative.
    /// Zero from the moment capital is exhausted.
    pub fn equity_at(&self, price: f64) -> f64 {
        if self.exhausted_at.is_some() {
            return 0.0;
        }
        let unrealized = self.open.as_ref().map_or(0.0, |book| {
            book.margin
                * book.remaining
                * self.leverage
                * book.direction.move_percent(book.entry_price, price)
                / 100.0
        });
        (self.capital + unrealized).max(0.0)
    }
}

/// Running peak tracker for drawdown.
#[derive(Debug, Clone, Copy, Default)]
struct Peak(f64);

impl Peak {
    fn drawdown(&mut self, equity: f64) -> f64 {
        if equity > self.0 {
            self.0 = equity;
        }
        if self.0 > 0.0 {
            (self.0 - equity) / self.0 * 100.0
        } else {
            0.0
        }
    }
}

/// Replay `events` over `candles`, fill in each closed trade's accounting,
/// and build the equity curve.
pub fn settle(
    params: &StrategyParams,
    candles: &[Candle],
    events: &[TradeEvent],
    trades: &mut [ClosedTrade],
) -> LedgerReport {
    let mut ledger = CapitalLedger::new(params);
    let mut peak = Peak::default();
    let mut curve = Vec::new();
    let mut next_event = 0;

    if params.equity_sampling == EquitySampling::PerTrade {
        if let Some(first) = candles.first() {
            let equity = ledger.capital();
            curve.push(EquityPoint {
                index: 0,
                time: first.timestamp,
                equity,
                drawdown_percent: peak.drawdown(equity),
            });
        }
    }

    for (index, candle) in candles.iter().enumerate() {
        while next_event < events.len() && events[next_event].index() <= index {
            let event = &events[next_event];
            ledger.apply(event);
            if params.equity_sampling == EquitySampling::PerTrade {
                if let TradeEvent::Closed { .. } = event {
                    let equity = ledger.capital();
                    curve.push(EquityPoint {
                        index,
                        time: candle.timestamp,
                        equity,
                        drawdown_percent: peak.drawdown(equity),
                    });
                }
            }
            next_event += 1;
        }

        if params.equity_sampling == EquitySampling::PerCandle {
            let equity = ledger.equity_at(candle.close);
            curve.push(EquityPoint {
                index,
                time: candle.timestamp,
                equity,
                drawdown_percent: peak.drawdown(equity),
            });
        }
    }

    for trade in trades.iter_mut() {
        if let Some(accounting) = ledger.accounting(trade.trade_id) {
            trade.accounting = accounting.clone();
        }
    }

    let final_equity = candles
        .last()
        .map_or(ledger.capital(), |c| ledger.equity_at(c.close));

    LedgerReport {
        equity_curve: curve,
        sampling: params.equity_sampling,
        initial_capital: params.initial_capital,
        final_capital: ledger.capital(),
        final_equity,
        total_commission: ledger.commission_paid(),
        capital_exhausted_at: ledger.exhausted_at(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExitKind;
    use chrono::TimeZone;

    fn fill(index: usize, price: f64, size: f64, entry: f64) -> ExitFill {
        ExitFill {
            index,
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            price,
            size_fraction: size,
            pnl_percent: Direction::Long.move_percent(entry, price),
            kind: ExitKind::TakeProfit { level: 1 },
        }
    }

    fn round_trip(ledger: &mut CapitalLedger, trade_id: usize, exit: f64) {
        ledger.apply(&TradeEvent::Opened {
            trade_id,
            index: 0,
            direction: Direction::Long,
            entry_price: 100.0,
            is_reentry: false,
        });
        ledger.apply(&TradeEvent::Filled {
            trade_id,
            fill: fill(1, exit, 1.0, 100.0),
        });
        ledger.apply(&TradeEvent::Closed {
            trade_id,
            index: 1,
            reason: crate::domain::ExitReason::LastTpLevel,
        });
    }

    #[test]
    fn leverage_and_commission_on_both_legs() {
        let params = StrategyParams {
            leverage: 2.0,
            commission_percent: 0.1,
            ..StrategyParams::default()
        };
        let mut ledger = CapitalLedger::new(&params);
        round_trip(&mut ledger, 0, 102.0);

        // realized 400, commission 20 + 20.4
        assert!((ledger.capital() - 10_359.6).abs() < 1e-6);
        assert!((ledger.commission_paid() - 40.4).abs() < 1e-9);
        let acc = ledger.accounting(0).unwrap();
        assert!((acc.leveraged_pnl_percent - 4.0).abs() < 1e-9);
        assert!((acc.commission_percent - 0.404).abs() < 1e-9);
        assert!((acc.net_pnl_percent - 3.596).abs() < 1e-9);
        assert!((acc.net_pnl - 359.6).abs() < 1e-6);
    }

    #[test]
    fn position_size_scales_margin() {
        let params = StrategyParams {
            position_size_percent: 25.0,
            ..StrategyParams::default()
        };
        let mut ledger = CapitalLedger::new(&params);
        round_trip(&mut ledger, 0, 110.0);
        assert!((ledger.capital() - 10_250.0).abs() < 1e-6);
        assert_eq!(ledger.accounting(0).unwrap().margin, 2_500.0);
    }

    #[test]
    fn capital_clamps_at_zero_and_later_trades_are_zero_size() {
        let params = StrategyParams {
            leverage: 20.0,
            ..StrategyParams::default()
        };
        let mut ledger = CapitalLedger::new(&params);
        round_trip(&mut ledger, 0, 94.0); // -6% × 20 = -120%
        assert_eq!(ledger.capital(), 0.0);
        assert_eq!(ledger.exhausted_at(), Some(1));

        round_trip(&mut ledger, 1, 110.0);
        assert_eq!(ledger.capital(), 0.0);
        let acc = ledger.accounting(1).unwrap();
        assert_eq!(acc.margin, 0.0);
        assert!((acc.net_pnl_percent - 200.0).abs() < 1e-9);
    }

    #[test]
    fn fills_after_exhaustion_do_not_restore_capital() {
        // Entry commission of 125% of capital exhausts the ledger on open.
        let params = StrategyParams {
            leverage: 250.0,
            commission_percent: 0.5,
            ..StrategyParams::default()
        };
        let mut ledger = CapitalLedger::new(&params);
        round_trip(&mut ledger, 0, 115.0);
        assert_eq!(ledger.exhausted_at(), Some(0));
        assert_eq!(ledger.capital(), 0.0);
        assert!((ledger.commission_paid() - 12_500.0).abs() < 1e-6);
        let acc = ledger.accounting(0).unwrap();
        assert_eq!(acc.margin, 10_000.0);
        assert_eq!(acc.capital_after, 0.0);

        round_trip(&mut ledger, 1, 115.0);
        assert_eq!(ledger.capital(), 0.0);
        assert_eq!(ledger.accounting(1).unwrap().margin, 0.0);
        assert_eq!(ledger.equity_at(150.0), 0.0);
    }

    #[test]
    fn mark_to_market_includes_open_remainder() {
        let params = StrategyParams::default();
        let mut ledger = CapitalLedger::new(&params);
        ledger.apply(&TradeEvent::Opened {
            trade_id: 0,
            index: 0,
            direction: Direction::Short,
            entry_price: 100.0,
            is_reentry: false,
        });
        assert!((ledger.equity_at(95.0) - 10_500.0).abs() < 1e-6);
    }

    #[test]
    fn peak_drawdown() {
        let mut peak = Peak::default();
        assert_eq!(peak.drawdown(100.0), 0.0);
        assert_eq!(peak.drawdown(120.0), 0.0);
        assert!((peak.drawdown(90.0) - 25.0).abs() < 1e-12);
    }
}
