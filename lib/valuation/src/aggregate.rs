//! Price aggregation and confidence
//!
//! Turns the final anchor set into one point estimate. Three strategies
//! read different parts of the price distribution and apply a fixed
//! discount:
//!
//! | strategy      | point                          | factor |
//! |---------------|--------------------------------|--------|
//! | `fair_value`  | similarity-weighted lower median | 0.93 |
//! | `competitive` | `sorted[⌊0.25·n⌋]`             | 0.90   |
//! | `premium`     | `sorted[⌊0.75·n⌋]`             | 0.95   |
//!
//! Confidence combines sample size, mean similarity and price stability:
//! `clamp01(min(n/20, 1) + mean_sim·0.3 + max(0, (0.5 - cv)·0.4))`, the last
//! term only for three or more anchors.

use crate::stats::{
    coefficient_of_variation, index_quantile, mean, median_sorted, round1, sorted, weighted_median,
};
use anchorx_core::Anchor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const NO_ANCHORS: &str = "no anchors found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStrategy {
    #[default]
    FairValue,
    Competitive,
    Premium,
}

impl PricingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingStrategy::FairValue => "fair_value",
            PricingStrategy::Competitive => "competitive",
            PricingStrategy::Premium => "premium",
        }
    }
}

impl fmt::Display for PricingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingStrategy {
    type Err = anchorx_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fair_value" | "fair" => Ok(PricingStrategy::FairValue),
            "competitive" => Ok(PricingStrategy::Competitive),
            "premium" => Ok(PricingStrategy::Premium),
            other => Err(anchorx_core::Error::InvalidRequest(format!(
                "unknown pricing strategy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl PriceRange {
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        let sorted = sorted(prices);
        Some(Self {
            min: *sorted.first()?,
            max: *sorted.last()?,
            mean: mean(&sorted)?,
            median: median_sorted(&sorted)?,
        })
    }
}

/// How a valuation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationStatus {
    Ok,
    /// No comparable listing survived selection
    NoAnchors,
    /// Short-circuited by the invalid item guard
    Invalid,
    /// Retrieval, configuration or request error
    Failed,
}

/// Outcome of a single valuation, always present even on failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub estimated_price: f64,
    pub anchor_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    pub confidence: f64,
    pub strategy: PricingStrategy,
    pub status: ValuationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl ValuationResult {
    fn degenerate(strategy: PricingStrategy, status: ValuationStatus) -> Self {
        Self {
            item_id: None,
            estimated_price: 0.0,
            anchor_count: 0,
            price_range: None,
            confidence: 0.0,
            strategy,
            status,
            error: None,
            skip_reason: None,
        }
    }

    pub fn no_anchors(strategy: PricingStrategy) -> Self {
        Self {
            error: Some(NO_ANCHORS.to_string()),
            ..Self::degenerate(strategy, ValuationStatus::NoAnchors)
        }
    }

    pub fn invalid(
        strategy: PricingStrategy,
        reason: impl Into<String>,
        salvage_value: f64,
    ) -> Self {
        Self {
            estimated_price: salvage_value,
            skip_reason: Some(reason.into()),
            ..Self::degenerate(strategy, ValuationStatus::Invalid)
        }
    }

    pub fn failed(strategy: PricingStrategy, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::degenerate(strategy, ValuationStatus::Failed)
        }
    }

    pub fn with_item_id(mut self, item_id: Option<String>) -> Self {
        self.item_id = item_id;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ValuationStatus::Ok
    }
}

/// Discounts and shape of the confidence model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceAggregator {
    pub fair_value_factor: f64,
    pub competitive_quantile: f64,
    pub competitive_factor: f64,
    pub premium_quantile: f64,
    pub premium_factor: f64,
    /// Anchor count at which the sample-size term saturates
    pub saturation_count: usize,
}

impl Default for PriceAggregator {
    fn default() -> Self {
        Self {
            fair_value_factor: 0.93,
            competitive_quantile: 0.25,
            competitive_factor: 0.90,
            premium_quantile: 0.75,
            premium_factor: 0.95,
            saturation_count: 20,
        }
    }
}

impl PriceAggregator {
    /// Undiscounted, unrounded point for `strategy`
    pub fn raw_point(&self, anchors: &[Anchor], strategy: PricingStrategy) -> Option<f64> {
        match strategy {
            PricingStrategy::FairValue => {
                let pairs: Vec<(f64, f64)> =
                    anchors.iter().map(|a| (a.price(), a.similarity)).collect();
                weighted_median(&pairs)
            }
            PricingStrategy::Competitive => {
                index_quantile(&sorted(&prices(anchors)), self.competitive_quantile)
            }
            PricingStrategy::Premium => {
                index_quantile(&sorted(&prices(anchors)), self.premium_quantile)
            }
        }
    }

    pub fn factor(&self, strategy: PricingStrategy) -> f64 {
        match strategy {
            PricingStrategy::FairValue => self.fair_value_factor,
            PricingStrategy::Competitive => self.competitive_factor,
            PricingStrategy::Premium => self.premium_factor,
        }
    }

    /// Estimated price rounded to one decimal, 0 without anchors
    pub fn estimate(&self, anchors: &[Anchor], strategy: PricingStrategy) -> f64 {
        self.raw_point(anchors, strategy)
            .map(|p| round1(p * self.factor(strategy)))
            .unwrap_or(0.0)
    }

    pub fn confidence(&self, anchors: &[Anchor]) -> f64 {
        if anchors.is_empty() {
            return 0.0;
        }
        let n = anchors.len();
        let size = (n as f64 / self.saturation_count.max(1) as f64).min(1.0);
        let similarities: Vec<f64> = anchors.iter().map(|a| a.similarity).collect();
        let similarity = mean(&similarities).unwrap_or(0.0) * 0.3;

        let stability = if n >= 3 {
            coefficient_of_variation(&prices(anchors))
                .map(|cv| ((0.5 - cv) * 0.4).max(0.0))
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let confidence = size + similarity + stability;
        if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn aggregate(&self, anchors: &[Anchor], strategy: PricingStrategy) -> ValuationResult {
        if anchors.is_empty() {
            return ValuationResult::no_anchors(strategy);
        }
        ValuationResult {
            item_id: None,
            estimated_price: self.estimate(anchors, strategy),
            anchor_count: anchors.len(),
            price_range: PriceRange::from_prices(&prices(anchors)),
            confidence: self.confidence(anchors),
            strategy,
            status: ValuationStatus::Ok,
            error: None,
            skip_reason: None,
        }
    }
}

fn prices(anchors: &[Anchor]) -> Vec<f64> {
    anchors.iter().map(Anchor::price).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorx_core::{AttributeMap, Candidate};

    fn anchor(price: f64, similarity: f64) -> Anchor {
        Anchor::new(Candidate::new(format!("p{}", price), AttributeMap::new(), price), similarity)
    }

    fn market() -> Vec<Anchor> {
        vec![
            anchor(100.0, 0.9),
            anchor(120.0, 0.8),
            anchor(80.0, 0.95),
            anchor(110.0, 0.85),
            anchor(90.0, 0.9),
        ]
    }

    #[test]
    fn test_single_anchor_weighted_median() {
        let aggregator = PriceAggregator::default();
        let anchors = vec![anchor(250.0, 0.75)];
        assert_eq!(aggregator.raw_point(&anchors, PricingStrategy::FairValue), Some(250.0));
        assert_eq!(aggregator.estimate(&anchors, PricingStrategy::FairValue), 232.5);
    }

    #[test]
    fn test_strategies() {
        let aggregator = PriceAggregator::default();
        let anchors = market();
        // sorted prices: 80 90 100 110 120
        assert_eq!(aggregator.estimate(&anchors, PricingStrategy::Competitive), 81.0);
        assert_eq!(aggregator.estimate(&anchors, PricingStrategy::Premium), 104.5);
        // cumulative weight reaches half (2.2) at 100
        assert_eq!(aggregator.estimate(&anchors, PricingStrategy::FairValue), 93.0);
    }

    #[test]
    fn test_confidence_in_unit_range() {
        let aggregator = PriceAggregator::default();
        let confidence = aggregator.confidence(&market());
        // 5/20 + 0.88*0.3 + (0.5 - cv)*0.4 with cv ~ 0.141
        assert!((confidence - (0.25 + 0.264 + (0.5 - 0.141_421_356) * 0.4)).abs() < 1e-6);

        let many: Vec<Anchor> = (0..40).map(|i| anchor(100.0 + i as f64 * 0.01, 1.0)).collect();
        assert_eq!(aggregator.confidence(&many), 1.0);
        assert_eq!(aggregator.confidence(&[]), 0.0);
    }

    #[test]
    fn test_no_stability_bonus_below_three() {
        let aggregator = PriceAggregator::default();
        let anchors = vec![anchor(100.0, 1.0), anchor(100.0, 1.0)];
        assert!((aggregator.confidence(&anchors) - (0.1 + 0.3)).abs() < 1e-12);
    }

    #[test]
    fn test_no_anchors_result() {
        let result = PriceAggregator::default().aggregate(&[], PricingStrategy::Premium);
        assert_eq!(result.estimated_price, 0.0);
        assert_eq!(result.anchor_count, 0);
        assert_eq!(result.error.as_deref(), Some(NO_ANCHORS));
        assert_eq!(result.status, ValuationStatus::NoAnchors);
        assert_eq!(result.strategy, PricingStrategy::Premium);
    }

    #[test]
    fn test_aggregate_populates_range() {
        let result = PriceAggregator::default().aggregate(&market(), PricingStrategy::FairValue);
        let range = result.price_range.unwrap();
        assert_eq!((range.min, range.max, range.mean, range.median), (80.0, 120.0, 100.0, 100.0));
        assert_eq!(result.anchor_count, 5);
        assert!(result.is_ok());
    }

    #[test]
    fn test_strategy_parse_and_serde() {
        assert_eq!("competitive".parse::<PricingStrategy>().unwrap(), PricingStrategy::Competitive);
        assert_eq!(" Fair_Value ".parse::<PricingStrategy>().unwrap(), PricingStrategy::FairValue);
        assert!("cheap".parse::<PricingStrategy>().is_err());
        assert_eq!(serde_json::to_string(&PricingStrategy::Premium).unwrap(), "\"premium\"");
    }

    #[test]
    fn test_result_serializes_flat() {
        let result = ValuationResult::no_anchors(PricingStrategy::FairValue);
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(value["estimated_price"], 0.0);
        assert_eq!(value["error"], NO_ANCHORS);
        assert_eq!(value["status"], "no_anchors");
        assert!(value.get("skip_reason").is_none());
    }
}
