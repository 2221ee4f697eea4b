//! Confirmation filters — veto trend-flip signals based on market conditions.
//!
//! Every filter is a pure function of precomputed auxiliary series. A signal
//! is allowed only when every active filter passes, so evaluation order never
//! changes the outcome; the gate still asks every filter so that all blocking
//! reasons are recorded.
//!
//! # Architecture invariant
//! Filters must not reference position or capital state — they evaluate
//! market conditions only.

pub mod direction;
pub mod momentum;
pub mod participation;
pub mod strength;
pub mod trend;
pub mod volatility;

pub use direction::DirectionFilter;
pub use momentum::MomentumFilter;
pub use participation::ParticipationFilter;
pub use strength::StrengthFilter;
pub use trend::TrendFilter;
pub use volatility::VolatilityFilter;

use serde::{Deserialize, Serialize};

use crate::config::{FilterConfig, TradingMode};
use crate::domain::{Candle, Direction};
use crate::indicators::{Indicator, IndicatorValues};

/// Result of one filter's evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum FilterVerdict {
    Passed,
    Blocked(String),
}

impl FilterVerdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Trait for confirmation filters.
pub trait SignalFilter: Send + Sync {
    /// Stable identifier recorded on blocked signals (e.g. "momentum").
    fn name(&self) -> &str;

    /// Auxiliary series this filter reads. Computed once per run.
    fn required_indicators(&self) -> Vec<Box<dyn Indicator>>;

    /// Allow or deny a proposed entry at `index`.
    fn evaluate(
        &self,
        index: usize,
        direction: Direction,
        candles: &[Candle],
        indicators: &IndicatorValues,
    ) -> FilterVerdict;
}

/// Instantiate the active filters from configuration.
///
/// The order is fixed so blocking reasons are always listed the same way.
pub fn build_filters(config: &FilterConfig) -> Vec<Box<dyn SignalFilter>> {
    let mut filters: Vec<Box<dyn SignalFilter>> = Vec::new();
    if config.direction != TradingMode::Both {
        filters.push(Box::new(DirectionFilter::new(config.direction)));
    }
    if let Some(cfg) = config.trend {
        filters.push(Box::new(TrendFilter::new(cfg)));
    }
    if let Some(cfg) = config.momentum {
        filters.push(Box::new(MomentumFilter::new(cfg)));
    }
    if let Some(cfg) = config.strength {
        filters.push(Box::new(StrengthFilter::new(cfg)));
    }
    if let Some(cfg) = config.volatility {
        filters.push(Box::new(VolatilityFilter::new(cfg)));
    }
    if let Some(cfg) = config.participation {
        filters.push(Box::new(ParticipationFilter::new(cfg)));
    }
    filters
}

/// Precompute every auxiliary series the filters need.
pub fn compute_indicators(candles: &[Candle], filters: &[Box<dyn SignalFilter>]) -> IndicatorValues {
    let indicators: Vec<Box<dyn Indicator>> = filters
        .iter()
        .flat_map(|f| f.required_indicators())
        .collect();
    IndicatorValues::compute_all(candles, &indicators)
}

/// Verdict for a filter whose series has no value at `index`.
pub(crate) fn undefined(series: &str, index: usize) -> FilterVerdict {
    FilterVerdict::Blocked(format!("{series} undefined at index {index}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MomentumFilterConfig, ParticipationFilterConfig};

    #[test]
    fn default_config_builds_no_filters() {
        assert!(build_filters(&FilterConfig::default()).is_empty());
    }

    #[test]
    fn build_order_is_fixed() {
        let config = FilterConfig {
            participation: Some(ParticipationFilterConfig::default()),
            momentum: Some(MomentumFilterConfig::default()),
            direction: TradingMode::LongOnly,
            ..FilterConfig::default()
        };
        let names: Vec<String> = build_filters(&config)
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, vec!["direction", "momentum", "participation"]);
    }

    #[test]
    fn shared_series_are_computed_once() {
        let config = FilterConfig {
            momentum: Some(MomentumFilterConfig::default()),
            ..FilterConfig::default()
        };
        let filters = build_filters(&config);
        let candles = crate::indicators::make_candles(&[100.0; 20]);
        let values = compute_indicators(&candles, &filters);
        assert!(values.contains("rsi_14"));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn verdict_serializes_with_reason() {
        let json = serde_json::to_string(&FilterVerdict::Blocked("too quiet".into())).unwrap();
        assert_eq!(json, r#"{"verdict":"blocked","reason":"too quiet"}"#);
    }
}
