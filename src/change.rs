//! Per-tile change detection against the previous frame.
//!
//! Each tile histogram is reduced to an ECDF and compared with the ECDF of
//! the same tile position in the previous frame using the two-sample
//! Kolmogorov-Smirnov statistic. The statistic is used as a change score,
//! not as a hypothesis test.

use anyhow::Result;

use crate::error::comparability;
use crate::histogram::Histogram;

/// Largest absolute gap between two ECDFs sampled at the same bucket edges.
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// KS statistic between two histograms with identical bucketing.
pub fn histogram_distance(old: &Histogram, new: &Histogram) -> f64 {
    ks_statistic(&old.ecdf(), &new.ecdf())
}

/// Outcome of comparing one frame's histograms with the stored baseline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeReport {
    /// KS statistic per histogram position; empty on the first frame.
    pub scores: Vec<f64>,
    /// Indices of histograms whose score met the threshold.
    pub changed: Vec<usize>,
    /// True when this frame only seeded the baseline.
    pub baseline_seeded: bool,
}

impl ChangeReport {
    pub fn triggered(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn max_score(&self) -> f64 {
        self.scores.iter().copied().fold(0.0, f64::max)
    }
}

/// Holds the previous frame's histograms and scores new frames against them.
pub struct ChangeDetector {
    threshold: f64,
    baseline: Option<Vec<Histogram>>,
}

impl ChangeDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            baseline: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Forget the stored histograms; the next frame starts a new series.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// Score `current` against the baseline, then make it the new baseline.
    ///
    /// Comparison is positional, so a different number of histograms (tile
    /// topology changed) or different bucketing is a `Comparability` error.
    /// On error the baseline is discarded.
    pub fn compare(&mut self, current: Vec<Histogram>) -> Result<ChangeReport> {
        let Some(previous) = self.baseline.take() else {
            self.baseline = Some(current);
            return Ok(ChangeReport {
                baseline_seeded: true,
                ..ChangeReport::default()
            });
        };

        if previous.len() != current.len() {
            return Err(comparability(format!(
                "image changed drastically, cannot evaluate histogram difference \
                 ({} tiles before, {} now); can be caused by large amounts of motion",
                previous.len(),
                current.len()
            )));
        }

        let mut report = ChangeReport::default();
        for (index, (old, new)) in previous.iter().zip(&current).enumerate() {
            if old.len() != new.len() || old.range() != new.range() {
                return Err(comparability(format!(
                    "histograms should have same bucketing, old: {} over {:?}, new: {} over {:?}",
                    old.len(),
                    old.range(),
                    new.len(),
                    new.range()
                )));
            }
            let score = histogram_distance(old, new);
            if score >= self.threshold {
                report.changed.push(index);
            }
            report.scores.push(score);
        }

        self.baseline = Some(current);
        Ok(report)
    }
}
