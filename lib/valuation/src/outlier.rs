//! IQR-based extreme value filter over anchor prices
//!
//! Quartiles are taken by simple indexing into the sorted prices
//! (`Q1 = sorted[n/4]`, `Q3 = sorted[3n/4]`), not interpolated. The filter
//! fails open: small samples pass through untouched, and a filter that
//! would leave fewer than `min_anchors` survivors is discarded.

use crate::stats::sorted;
use anchorx_core::Anchor;
use serde::{Deserialize, Serialize};

/// Below this many anchors there is nothing to estimate quartiles from
pub const MIN_SAMPLE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtremeValueFilter {
    /// IQR multiplier `k` for the bounds `[Q1 - k·IQR, Q3 + k·IQR]`
    pub multiplier: f64,
    /// Survivor floor; fewer survivors reverts to the input
    pub min_anchors: usize,
}

impl Default for ExtremeValueFilter {
    fn default() -> Self {
        Self { multiplier: 1.0, min_anchors: 3 }
    }
}

/// Outcome of one filter run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub anchors: Vec<Anchor>,
    /// Number of anchors dropped (0 when reverted)
    pub removed: usize,
    /// Price bounds, `None` when the sample was too small
    pub bounds: Option<(f64, f64)>,
    /// The filtered set fell below the floor and was discarded
    pub reverted: bool,
}

impl ExtremeValueFilter {
    pub fn new(multiplier: f64, min_anchors: usize) -> Self {
        Self { multiplier, min_anchors }
    }

    /// Price bounds for `prices`, `None` below [`MIN_SAMPLE`]
    pub fn bounds(&self, prices: &[f64]) -> Option<(f64, f64)> {
        if prices.len() < MIN_SAMPLE {
            return None;
        }
        let sorted = sorted(prices);
        let n = sorted.len();
        let q1 = sorted[n / 4];
        let q3 = sorted[(3 * n / 4).min(n - 1)];
        let iqr = q3 - q1;
        Some((q1 - self.multiplier * iqr, q3 + self.multiplier * iqr))
    }

    pub fn apply(&self, anchors: Vec<Anchor>) -> OutlierReport {
        let prices: Vec<f64> = anchors.iter().map(Anchor::price).collect();
        let Some((low, high)) = self.bounds(&prices) else {
            return OutlierReport { anchors, removed: 0, bounds: None, reverted: false };
        };

        let kept = anchors.iter().filter(|a| a.price() >= low && a.price() <= high).count();
        if kept < self.min_anchors {
            tracing::debug!(kept, floor = self.min_anchors, "outlier filter reverted");
            return OutlierReport { anchors, removed: 0, bounds: Some((low, high)), reverted: true };
        }

        let total = anchors.len();
        let anchors: Vec<Anchor> = anchors
            .into_iter()
            .filter(|a| a.price() >= low && a.price() <= high)
            .collect();
        OutlierReport {
            removed: total - anchors.len(),
            anchors,
            bounds: Some((low, high)),
            reverted: false,
        }
    }

    /// Filtered anchors only
    pub fn filter(&self, anchors: Vec<Anchor>) -> Vec<Anchor> {
        self.apply(anchors).anchors
    }
}
