//! 2-D score matrix over two swept parameters.
//!
//! A heatmap is a two-axis sweep folded into a grid: `cells[row][col]` holds
//! the score at `y.values[row]`, `x.values[col]`. Cells whose point failed or
//! never started are `None`.

use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use trendgate_core::config::StrategyParams;
use trendgate_core::domain::Candle;

use crate::error::SweepError;
use crate::grid::{Axis, ParamGrid};
use crate::score::Score;
use crate::sweep::{Optimizer, StopReason, SweepProgress, SweepReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub score_name: String,
    pub x: Axis,
    pub y: Axis,
    /// Row-major, one row per `y` value.
    pub cells: Vec<Vec<Option<f64>>>,
    pub stop_reason: StopReason,
}

/// A located cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub x: f64,
    pub y: f64,
    pub score: f64,
}

impl Heatmap {
    /// Fold a report from a grid whose axes are exactly `[x, y]`.
    pub fn from_report(grid: &ParamGrid, report: &SweepReport) -> Result<Self, SweepError> {
        let [x, y] = grid.axes.as_slice() else {
            return Err(SweepError::InvalidAxis {
                param: grid
                    .axes
                    .iter()
                    .map(|a| a.param.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
                reason: "a heatmap needs exactly two axes".to_string(),
            });
        };

        let mut cells = vec![vec![None; x.values.len()]; y.values.len()];
        for entry in report.evaluated() {
            if let [col, row] = grid.coordinates(entry.grid_index)[..] {
                cells[row][col] = entry.score();
            }
        }

        Ok(Self {
            score_name: report.score_name.clone(),
            x: x.clone(),
            y: y.clone(),
            cells,
            stop_reason: report.stop_reason,
        })
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.x.values.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Highest-scoring cell; NaN cells never win, ties go to the first cell.
    pub fn best(&self) -> Option<Cell> {
        let mut best: Option<Cell> = None;
        for (row, cells) in self.cells.iter().enumerate() {
            for (col, score) in cells.iter().enumerate() {
                let Some(score) = score.filter(|s| !s.is_nan()) else {
                    continue;
                };
                if best.map_or(true, |b| score > b.score) {
                    best = Some(Cell {
                        row,
                        col,
                        x: self.x.values[col],
                        y: self.y.values[row],
                        score,
                    });
                }
            }
        }
        best
    }

    /// Finite score range, for color scaling.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.cells
            .iter()
            .flatten()
            .flatten()
            .copied()
            .filter(|s| s.is_finite())
            .fold(None, |acc, s| match acc {
                None => Some((s, s)),
                Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
            })
    }
}

/// Sweep `x` × `y` over `base` and fold the result into a matrix.
#[allow(clippy::too_many_arguments)]
pub fn heatmap(
    optimizer: &Optimizer,
    candles: &[Candle],
    base: &StrategyParams,
    x: Axis,
    y: Axis,
    score: &dyn Score,
    progress: Option<&mut dyn FnMut(&SweepProgress<'_>)>,
    cancel: Option<&AtomicBool>,
) -> Result<Heatmap, SweepError> {
    if x.param == y.param {
        return Err(SweepError::SameHeatmapAxis(x.param.to_string()));
    }
    let grid = ParamGrid::new(base.clone()).with_axis(x).with_axis(y);
    let report = optimizer.sweep(candles, &grid, score, progress, cancel)?;
    Heatmap::from_report(&grid, &report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SweepParam;
    use crate::score::FitnessMetric;
    use crate::sweep::SweepConfig;
    use trendgate_core::synthetic::{generate, SyntheticConfig};

    fn optimizer() -> Optimizer {
        Optimizer::new(SweepConfig {
            workers: Some(2),
            ..SweepConfig::default()
        })
        .unwrap()
    }

    fn candles() -> Vec<Candle> {
        generate(&SyntheticConfig {
            candles: 500,
            ..SyntheticConfig::default()
        })
    }

    #[test]
    fn matrix_shape_follows_axes() {
        let map = heatmap(
            &optimizer(),
            &candles(),
            &StrategyParams::default(),
            Axis::new(SweepParam::AtrLength, vec![10.0, 14.0, 20.0]),
            Axis::new(SweepParam::Multiplier, vec![2.0, 3.0]),
            &FitnessMetric::TotalReturn,
            None,
            None,
        )
        .unwrap();

        assert_eq!(map.rows(), 2);
        assert_eq!(map.cols(), 3);
        assert!(map.cells.iter().flatten().all(Option::is_some));
        assert_eq!(map.stop_reason, StopReason::Completed);
    }

    #[test]
    fn cell_matches_single_run() {
        let candles = candles();
        let map = heatmap(
            &optimizer(),
            &candles,
            &StrategyParams::default(),
            Axis::new(SweepParam::AtrLength, vec![10.0, 20.0]),
            Axis::new(SweepParam::Multiplier, vec![2.0, 3.0]),
            &FitnessMetric::TotalReturn,
            None,
            None,
        )
        .unwrap();

        let params = StrategyParams {
            atr_length: 20,
            multiplier: 2.0,
            ..StrategyParams::default()
        };
        let direct = trendgate_core::run(&candles, &params).unwrap();
        assert_eq!(map.get(0, 1), Some(direct.metrics.total_return_percent));
    }

    #[test]
    fn failed_points_leave_holes() {
        // A leverage of 0 fails validation.
        let map = heatmap(
            &optimizer(),
            &candles(),
            &StrategyParams::default(),
            Axis::new(SweepParam::Leverage, vec![0.0, 1.0]),
            Axis::new(SweepParam::Multiplier, vec![3.0]),
            &FitnessMetric::TotalReturn,
            None,
            None,
        )
        .unwrap();
        assert_eq!(map.get(0, 0), None);
        assert!(map.get(0, 1).is_some());
        assert_eq!(map.best().map(|c| c.col), Some(1));
    }

    #[test]
    fn same_parameter_twice_is_rejected() {
        let err = heatmap(
            &optimizer(),
            &candles(),
            &StrategyParams::default(),
            Axis::new(SweepParam::Multiplier, vec![2.0]),
            Axis::new(SweepParam::Multiplier, vec![3.0]),
            &FitnessMetric::TotalReturn,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SweepError::SameHeatmapAxis(_)));
    }

    #[test]
    fn best_and_bounds_skip_missing_cells() {
        let map = Heatmap {
            score_name: "total_return".into(),
            x: Axis::new(SweepParam::AtrLength, vec![10.0, 20.0]),
            y: Axis::new(SweepParam::Multiplier, vec![2.0, 3.0]),
            cells: vec![vec![Some(1.0), None], vec![Some(f64::NAN), Some(4.0)]],
            stop_reason: StopReason::Completed,
        };
        let best = map.best().unwrap();
        assert_eq!((best.row, best.col, best.x, best.y), (1, 1, 20.0, 3.0));
        assert_eq!(map.bounds(), Some((1.0, 4.0)));
    }
}
