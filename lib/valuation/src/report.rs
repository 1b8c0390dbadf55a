//! Exploratory price distribution report

use crate::aggregate::{PriceAggregator, PricingStrategy};
use crate::selector::SearchStats;
use crate::stats::{coefficient_of_variation, index_quantile, mean, median_sorted, sorted, std_dev};
use anchorx_core::{Anchor, Category};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// `None` when the mean price is not positive
    pub coefficient_of_variation: Option<f64>,
}

/// Index-based percentiles (no interpolation)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub category: Category,
    pub anchor_count: usize,
    pub prices: Option<PriceStats>,
    pub percentiles: Option<Percentiles>,
    pub histogram: Vec<HistogramBin>,
    pub similarity: Option<SimilarityStats>,
    pub recommended_fair_value: f64,
    pub recommended_competitive: f64,
    pub search: SearchStats,
}

impl DistributionReport {
    pub fn build(
        category: Category,
        anchors: &[Anchor],
        search: SearchStats,
        aggregator: &PriceAggregator,
        bins: usize,
    ) -> Self {
        let prices: Vec<f64> = anchors.iter().map(Anchor::price).collect();
        let ordered = sorted(&prices);
        let similarities: Vec<f64> = anchors.iter().map(|a| a.similarity).collect();

        Self {
            category,
            anchor_count: anchors.len(),
            prices: price_stats(&ordered),
            percentiles: percentiles(&ordered),
            histogram: histogram(&ordered, bins),
            similarity: similarity_stats(&similarities),
            recommended_fair_value: aggregator.estimate(anchors, PricingStrategy::FairValue),
            recommended_competitive: aggregator.estimate(anchors, PricingStrategy::Competitive),
            search,
        }
    }
}

fn price_stats(sorted: &[f64]) -> Option<PriceStats> {
    Some(PriceStats {
        min: *sorted.first()?,
        max: *sorted.last()?,
        mean: mean(sorted)?,
        median: median_sorted(sorted)?,
        std_dev: std_dev(sorted)?,
        coefficient_of_variation: coefficient_of_variation(sorted),
    })
}

fn percentiles(sorted: &[f64]) -> Option<Percentiles> {
    Some(Percentiles {
        p10: index_quantile(sorted, 0.10)?,
        p25: index_quantile(sorted, 0.25)?,
        p50: index_quantile(sorted, 0.50)?,
        p75: index_quantile(sorted, 0.75)?,
        p90: index_quantile(sorted, 0.90)?,
    })
}

/// Equal-width bins over [min, max]; the last bin is closed. A single
/// distinct price yields one bin holding everything.
pub fn histogram(sorted: &[f64], bins: usize) -> Vec<HistogramBin> {
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }
    if max <= min {
        return vec![HistogramBin { lower: min, upper: max, count: sorted.len() }];
    }

    let width = (max - min) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();

    for price in sorted {
        let idx = (((price - min) / width).floor() as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

fn similarity_stats(similarities: &[f64]) -> Option<SimilarityStats> {
    let ordered = sorted(similarities);
    Some(SimilarityStats { min: *ordered.first()?, max: *ordered.last()?, mean: mean(&ordered)? })
}
