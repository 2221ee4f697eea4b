//! Parameter sweep — drive the full pipeline over every grid point in parallel.
//!
//! Workers run on a dedicated rayon pool and share only read-only inputs: the
//! candle slice, the resolved grid points and the score function. Each sends
//! its immutable entry over a channel to the calling thread, which alone owns
//! the ranking, the best-so-far leader and the progress callback.
//!
//! Stopping is cooperative. Every point checks the cancel flag and the
//! wall-clock budget before it starts; a point already running always
//! finishes. Points that never started are counted, not reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use trendgate_core::domain::{validate_series, Candle};
use trendgate_core::fingerprint::{RunFingerprint, SeriesHash};
use trendgate_core::metrics::RunMetrics;

use crate::cache::{CacheStats, CachedRun, RunCache};
use crate::error::SweepError;
use crate::grid::{Assignment, GridPoint, ParamGrid};
use crate::ranking::{self, Leader};
use crate::score::Score;

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Cores left free for the rest of the system.
    pub reserve_cores: usize,
    /// Exact worker count, overriding the core-based sizing.
    pub workers: Option<usize>,
    /// Wall-clock budget for the whole sweep. No new point starts once spent.
    pub budget: Option<Duration>,
    /// Maximum cached runs; 0 disables the cache.
    pub cache_capacity: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            reserve_cores: 1,
            workers: None,
            budget: None,
            cache_capacity: 4_096,
        }
    }
}

impl SweepConfig {
    /// Available cores minus the reserve, at least one.
    pub fn worker_count(&self) -> usize {
        if let Some(workers) = self.workers {
            return workers.max(1);
        }
        let available = std::thread::available_parallelism().map_or(1, |n| n.get());
        available.saturating_sub(self.reserve_cores).max(1)
    }
}

/// A successfully simulated grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(with = "trendgate_core::serde_float")]
    pub score: f64,
    pub metrics: RunMetrics,
    pub final_capital: f64,
    pub fingerprint: RunFingerprint,
    /// Served from the run cache instead of simulated.
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PointOutcome {
    Evaluated(Evaluation),
    /// The point's parameters or data were rejected by the pipeline.
    Failed { reason: String },
}

/// Result for one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub grid_index: usize,
    pub assignments: Vec<Assignment>,
    pub outcome: PointOutcome,
}

impl SweepEntry {
    pub fn evaluation(&self) -> Option<&Evaluation> {
        match &self.outcome {
            PointOutcome::Evaluated(evaluation) => Some(evaluation),
            PointOutcome::Failed { .. } => None,
        }
    }

    pub fn score(&self) -> Option<f64> {
        self.evaluation().map(|e| e.score)
    }
}

/// Why the sweep stopped dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every grid point ran.
    Completed,
    Cancelled,
    BudgetExceeded,
}

/// Snapshot handed to the progress callback after every finished point.
#[derive(Debug, Clone, Copy)]
pub struct SweepProgress<'a> {
    pub total: usize,
    pub finished: usize,
    pub failed: usize,
    pub not_started: usize,
    pub elapsed_secs: f64,
    pub best: Option<&'a SweepEntry>,
}

/// Everything a sweep produced, usable even when it stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub score_name: String,
    pub total_points: usize,
    /// Finished points in rank order; failed points last.
    pub entries: Vec<SweepEntry>,
    pub not_started: usize,
    pub stop_reason: StopReason,
    pub workers: usize,
    pub elapsed_secs: f64,
    pub cache_hits: u64,
}

impl SweepReport {
    pub fn best(&self) -> Option<&SweepEntry> {
        self.entries.first().filter(|e| e.evaluation().is_some())
    }

    pub fn evaluated(&self) -> impl Iterator<Item = &SweepEntry> {
        self.entries.iter().filter(|e| e.evaluation().is_some())
    }

    pub fn failed(&self) -> impl Iterator<Item = &SweepEntry> {
        self.entries.iter().filter(|e| e.evaluation().is_none())
    }

    pub fn top(&self, n: usize) -> &[SweepEntry] {
        let evaluated = self.evaluated().count();
        &self.entries[..n.min(evaluated)]
    }

    pub fn entry(&self, grid_index: usize) -> Option<&SweepEntry> {
        self.entries.iter().find(|e| e.grid_index == grid_index)
    }
}

enum Message {
    Finished(SweepEntry),
    Skipped(StopReason),
}

/// Cancel flag and deadline, checked before each point starts.
struct StopGate<'a> {
    cancel: Option<&'a AtomicBool>,
    deadline: Option<Instant>,
}

impl StopGate<'_> {
    fn check(&self) -> Option<StopReason> {
        if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Some(StopReason::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(StopReason::BudgetExceeded);
        }
        None
    }
}

/// Worker pool plus run cache. Reusable across sweeps and heatmaps.
pub struct Optimizer {
    config: SweepConfig,
    pool: rayon::ThreadPool,
    cache: Mutex<RunCache>,
}

impl Optimizer {
    pub fn new(config: SweepConfig) -> Result<Self, SweepError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("trendgate-sweep-{i}"))
            .build()?;
        let cache = Mutex::new(RunCache::new(config.cache_capacity));
        Ok(Self {
            config,
            pool,
            cache,
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().map(|c| c.stats()).unwrap_or_default()
    }

    /// Run every point of `grid` over `candles` and rank by `score`.
    ///
    /// `progress` runs on the calling thread after each finished point.
    /// Setting `cancel` stops new points from starting.
    pub fn sweep(
        &self,
        candles: &[Candle],
        grid: &ParamGrid,
        score: &dyn Score,
        mut progress: Option<&mut dyn FnMut(&SweepProgress<'_>)>,
        cancel: Option<&AtomicBool>,
    ) -> Result<SweepReport, SweepError> {
        grid.validate()?;
        validate_series(candles)?;

        let started = Instant::now();
        let gate = StopGate {
            cancel,
            deadline: self.config.budget.and_then(|b| started.checked_add(b)),
        };
        let series = SeriesHash::of(candles);
        let points = grid.points();
        let total = points.len();
        let hits_before = self.cache_stats().hits;

        info!(
            points = total,
            workers = self.workers(),
            score = %score.name(),
            "sweep started"
        );

        let (tx, rx) = mpsc::channel::<Message>();
        let mut entries = Vec::with_capacity(total);
        let mut leader = Leader::default();
        let mut stop_reason = StopReason::Completed;
        let mut failed = 0;
        let mut not_started = 0;

        let gate = &gate;
        let series = &series;
        let points = &points;
        std::thread::scope(|scope| {
            scope.spawn(move || {
                self.pool.scope(|pool_scope| {
                    for point in points {
                        let tx = tx.clone();
                        pool_scope.spawn(move |_| {
                            let message = match gate.check() {
                                Some(reason) => Message::Skipped(reason),
                                None => {
                                    Message::Finished(self.evaluate(candles, series, point, score))
                                }
                            };
                            // The receiver outlives every worker.
                            let _ = tx.send(message);
                        });
                    }
                });
            });

            for message in rx {
                match message {
                    Message::Finished(entry) => {
                        if let PointOutcome::Failed { reason } = &entry.outcome {
                            failed += 1;
                            warn!(grid_index = entry.grid_index, %reason, "grid point failed");
                        }
                        leader.offer(&entry);
                        entries.push(entry);
                    }
                    Message::Skipped(reason) => {
                        not_started += 1;
                        if stop_reason == StopReason::Completed {
                            stop_reason = reason;
                        }
                    }
                }
                if let Some(callback) = progress.as_deref_mut() {
                    callback(&SweepProgress {
                        total,
                        finished: entries.len(),
                        failed,
                        not_started,
                        elapsed_secs: started.elapsed().as_secs_f64(),
                        best: leader.best(),
                    });
                }
            }
        });

        ranking::rank(&mut entries);
        let elapsed_secs = started.elapsed().as_secs_f64();
        let best_score = entries.first().and_then(SweepEntry::score);
        info!(
            finished = entries.len(),
            failed,
            not_started,
            ?stop_reason,
            ?best_score,
            elapsed_secs,
            "sweep finished"
        );

        Ok(SweepReport {
            score_name: score.name(),
            total_points: total,
            entries,
            not_started,
            stop_reason,
            workers: self.workers(),
            elapsed_secs,
            cache_hits: self.cache_stats().hits.saturating_sub(hits_before),
        })
    }

    /// Simulate one point, or reuse a cached run of the same input pair.
    fn evaluate(
        &self,
        candles: &[Candle],
        series: &SeriesHash,
        point: &GridPoint,
        score: &dyn Score,
    ) -> SweepEntry {
        let fingerprint = RunFingerprint::new(series, &point.params);
        let cached = self.cache.lock().ok().and_then(|mut c| c.get(&fingerprint));

        let outcome = match cached {
            Some(run) => evaluated(score, &run, fingerprint, true),
            None => match trendgate_core::run(candles, &point.params) {
                Ok(result) => {
                    let run = Arc::new(CachedRun {
                        metrics: result.metrics,
                        final_capital: result.final_capital,
                    });
                    if let Ok(mut cache) = self.cache.lock() {
                        cache.insert(fingerprint.clone(), Arc::clone(&run));
                    }
                    evaluated(score, &run, fingerprint, false)
                }
                Err(err) => PointOutcome::Failed {
                    reason: err.to_string(),
                },
            },
        };

        SweepEntry {
            grid_index: point.grid_index,
            assignments: point.assignments.clone(),
            outcome,
        }
    }
}

fn evaluated(
    score: &dyn Score,
    run: &CachedRun,
    fingerprint: RunFingerprint,
    cached: bool,
) -> PointOutcome {
    PointOutcome::Evaluated(Evaluation {
        score: score.score(&run.metrics),
        metrics: run.metrics.clone(),
        final_capital: run.final_capital,
        fingerprint,
        cached,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Axis, SweepParam};
    use crate::score::FitnessMetric;
    use trendgate_core::config::StrategyParams;
    use trendgate_core::synthetic::{generate, SyntheticConfig};

    fn candles() -> Vec<Candle> {
        generate(&SyntheticConfig {
            candles: 600,
            ..SyntheticConfig::default()
        })
    }

    fn optimizer(workers: usize) -> Optimizer {
        Optimizer::new(SweepConfig {
            workers: Some(workers),
            ..SweepConfig::default()
        })
        .unwrap()
    }

    fn small_grid() -> ParamGrid {
        ParamGrid::new(StrategyParams::default())
            .with_axis(Axis::new(SweepParam::AtrLength, vec![10.0, 20.0]))
            .with_axis(Axis::new(SweepParam::Multiplier, vec![2.0, 3.0]))
    }

    #[test]
    fn worker_count_respects_override_and_minimum() {
        let config = SweepConfig {
            workers: Some(0),
            ..SweepConfig::default()
        };
        assert_eq!(config.worker_count(), 1);

        let config = SweepConfig {
            reserve_cores: usize::MAX,
            ..SweepConfig::default()
        };
        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn every_point_is_reported() {
        let report = optimizer(2)
            .sweep(&candles(), &small_grid(), &FitnessMetric::TotalReturn, None, None)
            .unwrap();
        assert_eq!(report.total_points, 4);
        assert_eq!(report.entries.len(), 4);
        assert_eq!(report.stop_reason, StopReason::Completed);
        assert_eq!(report.not_started, 0);
        assert!(report.best().is_some());
    }

    #[test]
    fn second_sweep_hits_cache() {
        let optimizer = optimizer(2);
        let candles = candles();
        let first = optimizer
            .sweep(&candles, &small_grid(), &FitnessMetric::Sharpe, None, None)
            .unwrap();
        let second = optimizer
            .sweep(&candles, &small_grid(), &FitnessMetric::Sharpe, None, None)
            .unwrap();
        assert_eq!(first.cache_hits, 0);
        assert_eq!(second.cache_hits, 4);
        assert!(second.evaluated().all(|e| e.evaluation().is_some_and(|ev| ev.cached)));
        let scores = |r: &SweepReport| r.entries.iter().map(|e| e.score()).collect::<Vec<_>>();
        assert_eq!(scores(&first), scores(&second));
    }

    #[test]
    fn invalid_series_aborts_sweep() {
        let mut candles = candles();
        candles.swap(3, 4);
        let err = optimizer(1)
            .sweep(&candles, &small_grid(), &FitnessMetric::TotalReturn, None, None)
            .unwrap_err();
        assert!(matches!(err, SweepError::Data(_)));
    }
}
