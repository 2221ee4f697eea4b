//! Parameter grids — base parameters plus axes over sweepable parameters.
//!
//! A grid expands to the cartesian product of its axes, first axis outermost.
//! Grid index `i` therefore maps to a fixed coordinate tuple, which is what
//! the heatmap uses to place cells.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use trendgate_core::config::{
    MomentumFilterConfig, ParticipationFilterConfig, StrategyParams, StrengthFilterConfig,
    TrendFilterConfig, VolatilityFilterConfig,
};

use crate::error::SweepError;

/// Guards range expansion against float accumulation at the upper bound.
const RANGE_EPSILON: f64 = 1e-9;

/// A parameter the optimizer can vary.
///
/// Integer parameters take the rounded axis value. Setting a filter
/// threshold activates that filter with defaults for its other fields.
/// Ladder levels are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SweepParam {
    AtrLength,
    Multiplier,
    StopPercent,
    Leverage,
    CommissionPercent,
    PositionSizePercent,
    TpDistance(usize),
    TpSize(usize),
    TrendEmaPeriod,
    RsiOverbought,
    RsiOversold,
    MinAdx,
    MinVolatilityPercent,
    MaxVolatilityPercent,
    MinVolumeRatio,
}

impl SweepParam {
    /// Write `value` into `params`.
    pub fn apply(self, params: &mut StrategyParams, value: f64) {
        match self {
            Self::AtrLength => params.atr_length = as_period(value),
            Self::Multiplier => params.multiplier = value,
            Self::StopPercent => params.stop_percent = value,
            Self::Leverage => params.leverage = value,
            Self::CommissionPercent => params.commission_percent = value,
            Self::PositionSizePercent => params.position_size_percent = value,
            Self::TpDistance(level) => {
                if let Some(spec) = params.tp_ladder.get_mut(level.wrapping_sub(1)) {
                    spec.distance_percent = value;
                }
            }
            Self::TpSize(level) => {
                if let Some(spec) = params.tp_ladder.get_mut(level.wrapping_sub(1)) {
                    spec.size_percent = value;
                }
            }
            Self::TrendEmaPeriod => {
                params
                    .filters
                    .trend
                    .get_or_insert_with(TrendFilterConfig::default)
                    .ema_period = as_period(value)
            }
            Self::RsiOverbought => {
                params
                    .filters
                    .momentum
                    .get_or_insert_with(MomentumFilterConfig::default)
                    .overbought = value
            }
            Self::RsiOversold => {
                params
                    .filters
                    .momentum
                    .get_or_insert_with(MomentumFilterConfig::default)
                    .oversold = value
            }
            Self::MinAdx => {
                params
                    .filters
                    .strength
                    .get_or_insert_with(StrengthFilterConfig::default)
                    .min_adx = value
            }
            Self::MinVolatilityPercent => {
                params
                    .filters
                    .volatility
                    .get_or_insert_with(VolatilityFilterConfig::default)
                    .min_percent = value
            }
            Self::MaxVolatilityPercent => {
                params
                    .filters
                    .volatility
                    .get_or_insert_with(VolatilityFilterConfig::default)
                    .max_percent = value
            }
            Self::MinVolumeRatio => {
                params
                    .filters
                    .participation
                    .get_or_insert_with(ParticipationFilterConfig::default)
                    .min_ratio = value
            }
        }
    }

    /// The ladder level this parameter addresses, if any.
    pub fn ladder_level(self) -> Option<usize> {
        match self {
            Self::TpDistance(level) | Self::TpSize(level) => Some(level),
            _ => None,
        }
    }
}

/// Negative and NaN values saturate to 0, which validation rejects.
fn as_period(value: f64) -> usize {
    value.round() as usize
}

impl fmt::Display for SweepParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtrLength => f.write_str("atr_length"),
            Self::Multiplier => f.write_str("multiplier"),
            Self::StopPercent => f.write_str("stop_percent"),
            Self::Leverage => f.write_str("leverage"),
            Self::CommissionPercent => f.write_str("commission_percent"),
            Self::PositionSizePercent => f.write_str("position_size_percent"),
            Self::TpDistance(level) => write!(f, "tp{level}_distance"),
            Self::TpSize(level) => write!(f, "tp{level}_size"),
            Self::TrendEmaPeriod => f.write_str("trend_ema_period"),
            Self::RsiOverbought => f.write_str("rsi_overbought"),
            Self::RsiOversold => f.write_str("rsi_oversold"),
            Self::MinAdx => f.write_str("min_adx"),
            Self::MinVolatilityPercent => f.write_str("min_volatility_percent"),
            Self::MaxVolatilityPercent => f.write_str("max_volatility_percent"),
            Self::MinVolumeRatio => f.write_str("min_volume_ratio"),
        }
    }
}

impl FromStr for SweepParam {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let param = match s {
            "atr_length" => Self::AtrLength,
            "multiplier" => Self::Multiplier,
            "stop_percent" => Self::StopPercent,
            "leverage" => Self::Leverage,
            "commission_percent" => Self::CommissionPercent,
            "position_size_percent" => Self::PositionSizePercent,
            "trend_ema_period" => Self::TrendEmaPeriod,
            "rsi_overbought" => Self::RsiOverbought,
            "rsi_oversold" => Self::RsiOversold,
            "min_adx" => Self::MinAdx,
            "min_volatility_percent" => Self::MinVolatilityPercent,
            "max_volatility_percent" => Self::MaxVolatilityPercent,
            "min_volume_ratio" => Self::MinVolumeRatio,
            other => return parse_ladder_param(other),
        };
        Ok(param)
    }
}

/// `tp<N>_distance` / `tp<N>_size`.
fn parse_ladder_param(s: &str) -> Result<SweepParam, SweepError> {
    let unknown = || SweepError::UnknownParam(s.to_string());
    let rest = s.strip_prefix("tp").ok_or_else(unknown)?;
    let (level, field) = rest.split_once('_').ok_or_else(unknown)?;
    let level: usize = level.parse().map_err(|_| unknown())?;
    if level == 0 {
        return Err(unknown());
    }
    match field {
        "distance" => Ok(SweepParam::TpDistance(level)),
        "size" => Ok(SweepParam::TpSize(level)),
        _ => Err(unknown()),
    }
}

impl TryFrom<String> for SweepParam {
    type Error = SweepError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SweepParam> for String {
    fn from(param: SweepParam) -> Self {
        param.to_string()
    }
}

/// One swept dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub param: SweepParam,
    pub values: Vec<f64>,
}

impl Axis {
    pub fn new(param: SweepParam, values: Vec<f64>) -> Self {
        Self { param, values }
    }

    /// Inclusive `start..=end` in steps of `step`.
    pub fn range(param: SweepParam, start: f64, end: f64, step: f64) -> Result<Self, SweepError> {
        let invalid = |reason: &str| SweepError::InvalidAxis {
            param: param.to_string(),
            reason: reason.to_string(),
        };
        if !(start.is_finite() && end.is_finite() && step.is_finite()) {
            return Err(invalid("range bounds must be finite"));
        }
        if step <= 0.0 {
            return Err(invalid("step must be positive"));
        }
        if end < start {
            return Err(invalid("end must not be below start"));
        }
        let steps = ((end - start) / step + RANGE_EPSILON).floor() as usize;
        let values = (0..=steps).map(|i| start + step * i as f64).collect();
        Ok(Self { param, values })
    }
}

/// `param=start:end:step` or `param=v1,v2,...`.
impl FromStr for Axis {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, spec) = s.split_once('=').ok_or_else(|| SweepError::InvalidAxis {
            param: s.to_string(),
            reason: "expected `param=start:end:step` or `param=v1,v2,...`".to_string(),
        })?;
        let param: SweepParam = name.trim().parse()?;
        let number = |text: &str| {
            text.trim().parse::<f64>().map_err(|_| SweepError::InvalidAxis {
                param: param.to_string(),
                reason: format!("`{}` is not a number", text.trim()),
            })
        };

        let parts: Vec<&str> = spec.split(':').collect();
        match parts.as_slice() {
            [start, end, step] => Self::range(param, number(start)?, number(end)?, number(step)?),
            [list] => {
                let values = list.split(',').map(number).collect::<Result<Vec<_>, _>>()?;
                Ok(Self { param, values })
            }
            _ => Err(SweepError::InvalidAxis {
                param: param.to_string(),
                reason: format!("cannot parse `{spec}`"),
            }),
        }
    }
}

/// One axis value assigned to one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub param: SweepParam,
    pub value: f64,
}

/// A fully resolved grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    pub grid_index: usize,
    pub assignments: Vec<Assignment>,
    pub params: StrategyParams,
}

/// Base parameters plus swept axes. Loadable from TOML:
///
/// ```toml
/// [base]
/// atr_length = 14
///
/// [[axes]]
/// param = "multiplier"
/// values = [2.0, 2.5, 3.0]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub base: StrategyParams,
    pub axes: Vec<Axis>,
}

impl ParamGrid {
    pub fn new(base: StrategyParams) -> Self {
        Self {
            base,
            axes: Vec::new(),
        }
    }

    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axes.push(axis);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SweepError> {
        let grid: Self = toml::from_str(text).map_err(|e| SweepError::Parse(e.to_string()))?;
        grid.validate()?;
        Ok(grid)
    }

    /// Structural checks. Individual points may still fail parameter
    /// validation; those become failed sweep entries.
    pub fn validate(&self) -> Result<(), SweepError> {
        for (i, axis) in self.axes.iter().enumerate() {
            if axis.values.is_empty() {
                return Err(SweepError::EmptyAxis(axis.param.to_string()));
            }
            if self.axes[..i].iter().any(|a| a.param == axis.param) {
                return Err(SweepError::InvalidAxis {
                    param: axis.param.to_string(),
                    reason: "parameter is swept twice".to_string(),
                });
            }
            if let Some(level) = axis.param.ladder_level() {
                if level > self.base.tp_ladder.len() {
                    return Err(SweepError::InvalidAxis {
                        param: axis.param.to_string(),
                        reason: format!(
                            "base ladder has {} level(s)",
                            self.base.tp_ladder.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of grid points. A grid without axes has one point: the base.
    pub fn size(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Per-axis value indices of grid point `grid_index`.
    pub fn coordinates(&self, grid_index: usize) -> Vec<usize> {
        let mut rest = grid_index;
        let mut coords = vec![0; self.axes.len()];
        for (slot, axis) in coords.iter_mut().zip(&self.axes).rev() {
            let len = axis.values.len().max(1);
            *slot = rest % len;
            rest /= len;
        }
        coords
    }

    /// Resolve one grid point.
    pub fn point(&self, grid_index: usize) -> GridPoint {
        let mut params = self.base.clone();
        let assignments: Vec<Assignment> = self
            .coordinates(grid_index)
            .into_iter()
            .zip(&self.axes)
            .map(|(i, axis)| Assignment {
                param: axis.param,
                value: axis.values[i],
            })
            .collect();
        for assignment in &assignments {
            assignment.param.apply(&mut params, assignment.value);
        }
        GridPoint {
            grid_index,
            assignments,
            params,
        }
    }

    /// Every grid point in grid-index order.
    pub fn points(&self) -> Vec<GridPoint> {
        (0..self.size()).map(|i| self.point(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendgate_core::config::TpLevelSpec;

    fn two_axis_grid() -> ParamGrid {
        ParamGrid::new(StrategyParams::default())
            .with_axis(Axis::new(SweepParam::AtrLength, vec![10.0, 14.0, 20.0]))
            .with_axis(Axis::new(SweepParam::Multiplier, vec![2.0, 3.0]))
    }

    #[test]
    fn size_is_product_of_axes() {
        assert_eq!(two_axis_grid().size(), 6);
        assert_eq!(ParamGrid::default().size(), 1);
    }

    #[test]
    fn first_axis_is_outermost() {
        let grid = two_axis_grid();
        assert_eq!(grid.coordinates(0), vec![0, 0]);
        assert_eq!(grid.coordinates(1), vec![0, 1]);
        assert_eq!(grid.coordinates(2), vec![1, 0]);
        assert_eq!(grid.coordinates(5), vec![2, 1]);

        let point = grid.point(3);
        assert_eq!(point.params.atr_length, 14);
        assert_eq!(point.params.multiplier, 3.0);
    }

    #[test]
    fn points_leave_base_untouched() {
        let grid = two_axis_grid();
        let points = grid.points();
        assert_eq!(points.len(), 6);
        assert_eq!(grid.base, StrategyParams::default());
        assert!(points.iter().enumerate().all(|(i, p)| p.grid_index == i));
    }

    #[test]
    fn range_is_inclusive() {
        let axis = Axis::range(SweepParam::Multiplier, 1.0, 2.0, 0.25).unwrap();
        assert_eq!(axis.values, vec![1.0, 1.25, 1.5, 1.75, 2.0]);
        // 0.1 steps accumulate error; the end value must still be included.
        let axis = Axis::range(SweepParam::StopPercent, 0.1, 0.5, 0.1).unwrap();
        assert_eq!(axis.values.len(), 5);
    }

    #[test]
    fn range_rejects_bad_step() {
        assert!(matches!(
            Axis::range(SweepParam::Multiplier, 1.0, 2.0, 0.0),
            Err(SweepError::InvalidAxis { .. })
        ));
    }

    #[test]
    fn axis_parses_from_cli_syntax() {
        let axis: Axis = "multiplier=2:3:0.5".parse().unwrap();
        assert_eq!(axis.param, SweepParam::Multiplier);
        assert_eq!(axis.values, vec![2.0, 2.5, 3.0]);

        let axis: Axis = "tp2_size=25,50".parse().unwrap();
        assert_eq!(axis.param, SweepParam::TpSize(2));
        assert_eq!(axis.values, vec![25.0, 50.0]);

        assert!("bogus=1,2".parse::<Axis>().is_err());
        assert!("tp0_size=1".parse::<Axis>().is_err());
        assert!("multiplier".parse::<Axis>().is_err());
    }

    #[test]
    fn param_names_round_trip() {
        for param in [
            SweepParam::AtrLength,
            SweepParam::TpDistance(3),
            SweepParam::MinVolumeRatio,
        ] {
            assert_eq!(param.to_string().parse::<SweepParam>().unwrap(), param);
        }
    }

    #[test]
    fn filter_threshold_activates_filter() {
        let mut params = StrategyParams::default();
        assert!(params.filters.strength.is_none());
        SweepParam::MinAdx.apply(&mut params, 25.0);
        let strength = params.filters.strength.unwrap();
        assert_eq!(strength.min_adx, 25.0);
        assert_eq!(strength.adx_period, StrengthFilterConfig::default().adx_period);
    }

    #[test]
    fn ladder_axis_beyond_base_ladder_is_rejected() {
        let grid = ParamGrid::new(StrategyParams::default())
            .with_axis(Axis::new(SweepParam::TpDistance(2), vec![3.0]));
        assert!(matches!(grid.validate(), Err(SweepError::InvalidAxis { .. })));

        let mut base = StrategyParams::default();
        base.tp_ladder = vec![TpLevelSpec::new(1.0, 50.0), TpLevelSpec::new(2.0, 50.0)];
        let grid = ParamGrid::new(base).with_axis(Axis::new(SweepParam::TpDistance(2), vec![3.0]));
        assert!(grid.validate().is_ok());
        assert_eq!(grid.point(0).params.tp_ladder[1].distance_percent, 3.0);
    }

    #[test]
    fn duplicate_and_empty_axes_are_rejected() {
        let grid = two_axis_grid().with_axis(Axis::new(SweepParam::AtrLength, vec![5.0]));
        assert!(grid.validate().is_err());

        let grid = ParamGrid::default().with_axis(Axis::new(SweepParam::Leverage, vec![]));
        assert!(matches!(grid.validate(), Err(SweepError::EmptyAxis(_))));
    }

    #[test]
    fn grid_loads_from_toml() {
        let text = r#"
            [base]
            atr_length = 21

            [[axes]]
            param = "multiplier"
            values = [2.0, 4.0]

            [[axes]]
            param = "tp1_distance"
            values = [1.0, 2.0, 3.0]
        "#;
        let grid = ParamGrid::from_toml_str(text).unwrap();
        assert_eq!(grid.base.atr_length, 21);
        assert_eq!(grid.axes[1].param, SweepParam::TpDistance(1));
        assert_eq!(grid.size(), 6);
    }
}
