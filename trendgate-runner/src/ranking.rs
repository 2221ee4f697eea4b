//! Deterministic ranking of sweep entries.
//!
//! Order: evaluated points by score descending, ties broken by lower max
//! drawdown, then by grid index. Failed points sort after every evaluated
//! one, by grid index. NaN scores rank below every number. The order is a
//! pure function of the entries, so it does not depend on which worker
//! finished first.

use std::cmp::Ordering;

use crate::sweep::{PointOutcome, SweepEntry};

/// NaN sorts below `-inf` so it never wins.
fn rank_score(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Total order over entries; `Less` means `a` ranks ahead of `b`.
pub fn compare(a: &SweepEntry, b: &SweepEntry) -> Ordering {
    match (&a.outcome, &b.outcome) {
        (PointOutcome::Evaluated(ea), PointOutcome::Evaluated(eb)) => rank_score(eb.score)
            .total_cmp(&rank_score(ea.score))
            .then_with(|| {
                ea.metrics
                    .max_drawdown_percent
                    .total_cmp(&eb.metrics.max_drawdown_percent)
            })
            .then_with(|| a.grid_index.cmp(&b.grid_index)),
        (PointOutcome::Evaluated(_), PointOutcome::Failed { .. }) => Ordering::Less,
        (PointOutcome::Failed { .. }, PointOutcome::Evaluated(_)) => Ordering::Greater,
        (PointOutcome::Failed { .. }, PointOutcome::Failed { .. }) => {
            a.grid_index.cmp(&b.grid_index)
        }
    }
}

/// Whether `candidate` ranks strictly ahead of `incumbent`.
pub fn outranks(candidate: &SweepEntry, incumbent: &SweepEntry) -> bool {
    compare(candidate, incumbent) == Ordering::Less
}

/// Sort in place into rank order.
pub fn rank(entries: &mut [SweepEntry]) {
    entries.sort_by(compare);
}

/// Best-so-far tracker for the aggregator.
#[derive(Debug, Default)]
pub struct Leader {
    best: Option<SweepEntry>,
}

impl Leader {
    /// Offer an entry; returns true when it became the new leader.
    pub fn offer(&mut self, entry: &SweepEntry) -> bool {
        if !matches!(entry.outcome, PointOutcome::Evaluated(_)) {
            return false;
        }
        let better = self.best.as_ref().map_or(true, |best| outranks(entry, best));
        if better {
            self.best = Some(entry.clone());
        }
        better
    }

    pub fn best(&self) -> Option<&SweepEntry> {
        self.best.as_ref()
    }
}
