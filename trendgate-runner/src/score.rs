//! Scoring — reduce one run's metrics to the scalar the optimizer ranks by.

use serde::{Deserialize, Serialize};
use trendgate_core::metrics::RunMetrics;

use crate::error::SweepError;

/// Profit factor is unbounded with no losing trades; blends cap it here.
const BLEND_PROFIT_FACTOR_CAP: f64 = 10.0;

/// Return-over-drawdown floors the drawdown so near-flat curves don't explode.
const MIN_DRAWDOWN_PERCENT: f64 = 1.0;

/// Scalar fitness of one run. Higher is better.
pub trait Score: Send + Sync {
    fn name(&self) -> String;
    fn score(&self, metrics: &RunMetrics) -> f64;
}

/// Which single metric to optimize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    TotalReturn,
    Sharpe,
    Sortino,
    ProfitFactor,
    WinRate,
    Expectancy,
    /// Total return divided by max drawdown.
    ReturnOverDrawdown,
    /// Negated max drawdown, so that smaller drawdowns rank higher.
    MaxDrawdown,
}

impl FitnessMetric {
    pub const ALL: [FitnessMetric; 8] = [
        Self::TotalReturn,
        Self::Sharpe,
        Self::Sortino,
        Self::ProfitFactor,
        Self::WinRate,
        Self::Expectancy,
        Self::ReturnOverDrawdown,
        Self::MaxDrawdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TotalReturn => "total_return",
            Self::Sharpe => "sharpe",
            Self::Sortino => "sortino",
            Self::ProfitFactor => "profit_factor",
            Self::WinRate => "win_rate",
            Self::Expectancy => "expectancy",
            Self::ReturnOverDrawdown => "return_over_drawdown",
            Self::MaxDrawdown => "max_drawdown",
        }
    }

    pub fn extract(self, metrics: &RunMetrics) -> f64 {
        match self {
            Self::TotalReturn => metrics.total_return_percent,
            Self::Sharpe => metrics.sharpe,
            Self::Sortino => metrics.sortino,
            Self::ProfitFactor => metrics.profit_factor,
            Self::WinRate => metrics.win_rate,
            Self::Expectancy => metrics.expectancy_percent,
            Self::ReturnOverDrawdown => {
                metrics.total_return_percent
                    / metrics.max_drawdown_percent.max(MIN_DRAWDOWN_PERCENT)
            }
            Self::MaxDrawdown => -metrics.max_drawdown_percent,
        }
    }
}

impl std::str::FromStr for FitnessMetric {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| SweepError::UnknownMetric(s.to_string()))
    }
}

impl Score for FitnessMetric {
    fn name(&self) -> String {
        self.as_str().to_string()
    }

    fn score(&self, metrics: &RunMetrics) -> f64 {
        self.extract(metrics)
    }
}

/// Weighted sum of several metrics.
///
/// The default weighs profit, win rate and drawdown: total return percent
/// plus 50 × win rate minus max drawdown percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedBlend {
    pub terms: Vec<(FitnessMetric, f64)>,
}

impl WeightedBlend {
    pub fn new(terms: Vec<(FitnessMetric, f64)>) -> Self {
        Self { terms }
    }
}

impl Default for WeightedBlend {
    fn default() -> Self {
        Self::new(vec![
            (FitnessMetric::TotalReturn, 1.0),
            (FitnessMetric::WinRate, 50.0),
            (FitnessMetric::MaxDrawdown, 1.0),
        ])
    }
}

impl Score for WeightedBlend {
    fn name(&self) -> String {
        self.terms
            .iter()
            .map(|(metric, weight)| format!("{weight}*{}", metric.as_str()))
            .collect::<Vec<_>>()
            .join("+")
    }

    fn score(&self, metrics: &RunMetrics) -> f64 {
        self.terms
            .iter()
            .map(|(metric, weight)| {
                let value = match metric {
                    FitnessMetric::ProfitFactor => {
                        metrics.profit_factor.min(BLEND_PROFIT_FACTOR_CAP)
                    }
                    other => other.extract(metrics),
                };
                weight * value
            })
            .sum()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::metrics;
    use super::*;

    #[test]
    fn default_is_total_return() {
        assert_eq!(FitnessMetric::default(), FitnessMetric::TotalReturn);
        assert_eq!(FitnessMetric::TotalReturn.score(&metrics(12.5, 0.5, 4.0)), 12.5);
    }

    #[test]
    fn max_drawdown_is_negated() {
        let m = metrics(0.0, 0.0, 8.0);
        assert_eq!(FitnessMetric::MaxDrawdown.score(&m), -8.0);
    }

    #[test]
    fn return_over_drawdown_floors_drawdown() {
        assert_eq!(
            FitnessMetric::ReturnOverDrawdown.score(&metrics(10.0, 0.0, 5.0)),
            2.0
        );
        assert_eq!(
            FitnessMetric::ReturnOverDrawdown.score(&metrics(10.0, 0.0, 0.0)),
            10.0
        );
    }

    #[test]
    fn blend_weighs_terms() {
        let blend = WeightedBlend::default();
        // 20 + 50 * 0.6 - 5
        let score = blend.score(&metrics(20.0, 0.6, 5.0));
        assert!((score - 45.0).abs() < 1e-12);
    }

    #[test]
    fn blend_caps_infinite_profit_factor() {
        let blend = WeightedBlend::new(vec![(FitnessMetric::ProfitFactor, 1.0)]);
        let m = RunMetrics {
            profit_factor: f64::INFINITY,
            ..metrics(1.0, 1.0, 0.0)
        };
        assert_eq!(blend.score(&m), BLEND_PROFIT_FACTOR_CAP);
        assert_eq!(FitnessMetric::ProfitFactor.score(&m), f64::INFINITY);
    }

    #[test]
    fn metric_names_parse() {
        for metric in FitnessMetric::ALL {
            assert_eq!(metric.as_str().parse::<FitnessMetric>().unwrap(), metric);
        }
        assert!("calmar".parse::<FitnessMetric>().is_err());
    }
}
