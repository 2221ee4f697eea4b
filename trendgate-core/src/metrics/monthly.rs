//! Monthly breakdown of closed trades, keyed by exit month.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::ratio;
use crate::domain::ClosedTrade;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub year: i32,
    pub month: u32,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    /// Sum of net PnL percent of trades closed in the month.
    pub net_pnl_percent: f64,
    /// Net PnL in account currency.
    pub net_pnl: f64,
}

impl MonthlyStats {
    fn add_trade(&mut self, trade: &ClosedTrade) {
        self.trades += 1;
        if trade.is_winner() {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.win_rate = ratio(self.wins, self.trades);
        self.net_pnl_percent += trade.accounting.net_pnl_percent;
        self.net_pnl += trade.accounting.net_pnl;
    }
}

/// Group trades by the calendar month (UTC) of their exit, in chronological order.
pub fn monthly_stats(trades: &[ClosedTrade]) -> Vec<MonthlyStats> {
    let mut months: BTreeMap<(i32, u32), MonthlyStats> = BTreeMap::new();
    for trade in trades {
        let key = (trade.exit_time.year(), trade.exit_time.month());
        months
            .entry(key)
            .or_insert_with(|| MonthlyStats {
                year: key.0,
                month: key.1,
                ..MonthlyStats::default()
            })
            .add_trade(trade);
    }
    months.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::trade;

    #[test]
    fn groups_by_exit_month_in_order() {
        let trades = vec![
            trade(0, 2.0, &[true], 3),
            trade(1, -1.0, &[false], 1),
            trade(2, 1.5, &[true], 3),
        ];
        let months = monthly_stats(&trades);
        assert_eq!(months.len(), 2);
        assert_eq!((months[0].year, months[0].month), (2024, 1));
        assert_eq!(months[0].losses, 1);
        let march = &months[1];
        assert_eq!(march.trades, 2);
        assert_eq!(march.win_rate, 1.0);
        assert!((march.net_pnl_percent - 3.5).abs() < 1e-12);
        assert!((march.net_pnl - 35.0).abs() < 1e-9);
    }
}
