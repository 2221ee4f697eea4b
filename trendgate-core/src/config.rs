//! Strategy parameters — every recognized option enumerated, defaulted, and
//! validated once before a simulation starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelKind;
use crate::error::ConfigError;

/// Tolerance for the ladder size sum so that e.g. 33.3 + 33.3 + 33.4 passes.
const LADDER_SUM_EPSILON: f64 = 1e-9;

/// How the stop price trails after entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// The stop never moves after entry.
    #[default]
    Fixed,
    /// Once the first take-profit is hit, the stop jumps to the entry price.
    Breakeven,
    /// After hitting level k, the stop moves to the price of level k-1 (level 0 = entry).
    Cascade,
}

/// Reference price for the initial stop distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBaseline {
    #[default]
    Entry,
    /// Midpoint of the channel on the entry bar.
    MidChannel,
}

/// When the ledger records equity points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquitySampling {
    /// One mark-to-market point per candle; drawdown is exact.
    #[default]
    PerCandle,
    /// One point per trade-closing event; drawdown is an approximation.
    PerTrade,
}

/// Which signal directions may open positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    #[default]
    Both,
    LongOnly,
    ShortOnly,
}

/// One take-profit rung as configured: distance from entry and share of the position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TpLevelSpec {
    pub distance_percent: f64,
    pub size_percent: f64,
}

impl TpLevelSpec {
    pub fn new(distance_percent: f64, size_percent: f64) -> Self {
        Self {
            distance_percent,
            size_percent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ReentryConfig {
    pub enabled: bool,
    pub after_stop_loss: bool,
    pub after_take_profit: bool,
}

impl Default for ReentryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            after_stop_loss: true,
            after_take_profit: true,
        }
    }
}

/// Optional inclusive window restricting which candles are simulated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| timestamp >= s) && self.end.map_or(true, |e| timestamp <= e)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Close must sit on the signal's side of an EMA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendFilterConfig {
    pub ema_period: usize,
}

impl Default for TrendFilterConfig {
    fn default() -> Self {
        Self { ema_period: 200 }
    }
}

/// RSI must not be stretched in the signal's direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumFilterConfig {
    pub rsi_period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for MomentumFilterConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

/// ADX must reach a minimum trend strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthFilterConfig {
    pub adx_period: usize,
    pub min_adx: f64,
}

impl Default for StrengthFilterConfig {
    fn default() -> Self {
        Self {
            adx_period: 14,
            min_adx: 20.0,
        }
    }
}

/// ATR as a percent of close must sit inside a band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityFilterConfig {
    pub atr_period: usize,
    pub min_percent: f64,
    pub max_percent: f64,
}

impl Default for VolatilityFilterConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            min_percent: 0.2,
            max_percent: 10.0,
        }
    }
}

/// Volume must reach a multiple of its moving average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipationFilterConfig {
    pub volume_period: usize,
    pub min_ratio: f64,
}

impl Default for ParticipationFilterConfig {
    fn default() -> Self {
        Self {
            volume_period: 20,
            min_ratio: 1.0,
        }
    }
}

/// Confirmation filters. A `None` filter is inactive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub trend: Option<TrendFilterConfig>,
    pub momentum: Option<MomentumFilterConfig>,
    pub strength: Option<StrengthFilterConfig>,
    pub volatility: Option<VolatilityFilterConfig>,
    pub participation: Option<ParticipationFilterConfig>,
    pub direction: TradingMode,
}

/// Complete parameter object for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub channel: ChannelKind,
    pub atr_length: usize,
    pub multiplier: f64,
    pub filters: FilterConfig,
    pub tp_ladder: Vec<TpLevelSpec>,
    pub stop_percent: f64,
    pub stop_mode: StopMode,
    pub stop_baseline: StopBaseline,
    pub leverage: f64,
    pub commission_percent: f64,
    /// Share of running capital committed as margin per trade.
    pub position_size_percent: f64,
    pub reentry: ReentryConfig,
    pub initial_capital: f64,
    pub equity_sampling: EquitySampling,
    pub date_range: DateRange,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            channel: ChannelKind::AtrBands,
            atr_length: 14,
            multiplier: 3.0,
            filters: FilterConfig::default(),
            tp_ladder: vec![TpLevelSpec::new(2.0, 100.0)],
            stop_percent: 6.0,
            stop_mode: StopMode::Fixed,
            stop_baseline: StopBaseline::Entry,
            leverage: 1.0,
            commission_percent: 0.0,
            position_size_percent: 100.0,
            reentry: ReentryConfig::default(),
            initial_capital: 10_000.0,
            equity_sampling: EquitySampling::PerCandle,
            date_range: DateRange::default(),
        }
    }
}

impl StrategyParams {
    /// Parse TOML and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let params: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Parse JSON and validate.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let params: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Minimum number of candles for the channel to produce at least one
    /// evaluable trend bar: ATR is defined from index `atr_length`, and the
    /// flip rule needs the previous bar's bands.
    pub fn min_history(&self) -> usize {
        self.atr_length + 2
    }

    /// Sum of configured take-profit sizes, in percent.
    pub fn ladder_size_percent(&self) -> f64 {
        self.tp_ladder.iter().map(|l| l.size_percent).sum()
    }

    /// Check every option. Fails on the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.atr_length < 1 {
            return Err(out_of_range("atr_length", ">= 1", self.atr_length as f64));
        }
        if !(self.multiplier.is_finite() && self.multiplier > 0.0) {
            return Err(out_of_range("multiplier", "positive", self.multiplier));
        }
        if !(self.stop_percent.is_finite() && self.stop_percent > 0.0 && self.stop_percent < 100.0)
        {
            return Err(out_of_range("stop_percent", "in (0, 100)", self.stop_percent));
        }
        if !(self.leverage.is_finite() && self.leverage > 0.0) {
            return Err(out_of_range("leverage", "positive", self.leverage));
        }
        if !(self.commission_percent.is_finite()
            && self.commission_percent >= 0.0
            && self.commission_percent < 100.0)
        {
            return Err(out_of_range(
                "commission_percent",
                "in [0, 100)",
                self.commission_percent,
            ));
        }
        if !(self.position_size_percent.is_finite()
            && self.position_size_percent > 0.0
            && self.position_size_percent <= 100.0)
        {
            return Err(out_of_range(
                "position_size_percent",
                "in (0, 100]",
                self.position_size_percent,
            ));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(out_of_range("initial_capital", "positive", self.initial_capital));
        }
        if let (Some(start), Some(end)) = (self.date_range.start, self.date_range.end) {
            if start >= end {
                return Err(ConfigError::InvertedDateRange { start, end });
            }
        }

        self.validate_ladder()?;
        self.validate_filters()
    }

    fn validate_ladder(&self) -> Result<(), ConfigError> {
        if self.tp_ladder.is_empty() {
            return Err(ConfigError::EmptyLadder);
        }

        let mut previous: Option<f64> = None;
        for (i, spec) in self.tp_ladder.iter().enumerate() {
            let level = i + 1;
            if !(spec.distance_percent.is_finite()
                && spec.distance_percent > 0.0
                && spec.distance_percent < 100.0)
            {
                return Err(ConfigError::InvalidLevel {
                    level,
                    reason: format!("distance {}% must be in (0, 100)", spec.distance_percent),
                });
            }
            if !(spec.size_percent.is_finite() && spec.size_percent > 0.0) {
                return Err(ConfigError::InvalidLevel {
                    level,
                    reason: format!("size {}% must be positive", spec.size_percent),
                });
            }
            if let Some(prev) = previous {
                if spec.distance_percent <= prev {
                    return Err(ConfigError::NonMonotonicLadder {
                        level,
                        distance: spec.distance_percent,
                        previous: prev,
                    });
                }
            }
            previous = Some(spec.distance_percent);
        }

        let total = self.ladder_size_percent();
        if total > 100.0 + LADDER_SUM_EPSILON {
            return Err(ConfigError::LadderOversized {
                total_percent: total,
            });
        }
        Ok(())
    }

    fn validate_filters(&self) -> Result<(), ConfigError> {
        let filters = &self.filters;
        if let Some(trend) = filters.trend {
            require_period("trend", trend.ema_period)?;
        }
        if let Some(momentum) = filters.momentum {
            require_period("momentum", momentum.rsi_period)?;
            let ordered = momentum.oversold >= 0.0
                && momentum.oversold < momentum.overbought
                && momentum.overbought <= 100.0;
            if !ordered {
                return Err(ConfigError::InvalidFilter {
                    filter: "momentum",
                    reason: format!(
                        "thresholds must satisfy 0 <= oversold ({}) < overbought ({}) <= 100",
                        momentum.oversold, momentum.overbought
                    ),
                });
            }
        }
        if let Some(strength) = filters.strength {
            require_period("strength", strength.adx_period)?;
            if !(strength.min_adx.is_finite() && strength.min_adx >= 0.0) {
                return Err(ConfigError::InvalidFilter {
                    filter: "strength",
                    reason: format!("min_adx {} must be >= 0", strength.min_adx),
                });
            }
        }
        if let Some(volatility) = filters.volatility {
            require_period("volatility", volatility.atr_period)?;
            if !(volatility.min_percent >= 0.0 && volatility.max_percent >= volatility.min_percent)
            {
                return Err(ConfigError::InvalidFilter {
                    filter: "volatility",
                    reason: format!(
                        "band must satisfy 0 <= min ({}) <= max ({})",
                        volatility.min_percent, volatility.max_percent
                    ),
                });
            }
        }
        if let Some(participation) = filters.participation {
            require_period("participation", participation.volume_period)?;
            if !(participation.min_ratio.is_finite() && participation.min_ratio > 0.0) {
                return Err(ConfigError::InvalidFilter {
                    filter: "participation",
                    reason: format!("min_ratio {} must be positive", participation.min_ratio),
                });
            }
        }
        Ok(())
    }
}

fn out_of_range(field: &'static str, requirement: &'static str, value: f64) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        requirement,
        value,
    }
}

fn require_period(filter: &'static str, period: usize) -> Result<(), ConfigError> {
    if period == 0 {
        return Err(ConfigError::InvalidFilter {
            filter,
            reason: "period must be >= 1".to_string(),
        });
    }
    Ok(())
}
