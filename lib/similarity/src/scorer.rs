//! Similarity scorer
//!
//! Computes one normalized similarity between a target item and a
//! candidate listing, with per-attribute contributions for explanation.

use crate::config::{Tolerance, ToleranceConfig, WeightConfig};
use crate::distance::{
    exact_similarity, list_similarity, neutral_similarity, relative_similarity, tiered_similarity,
};
use crate::registry::PluginRegistry;
use anchorx_core::{AttributeKey, AttributeMap, AttributeValue, Category};
use std::collections::{BTreeMap, BTreeSet};

static ZERO: AttributeValue = AttributeValue::Number(0.0);

/// Result of scoring one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    /// Weighted mean similarity in [0, 1]
    pub score: f64,
    /// Per-attribute contribution: weight share times similarity
    pub contributions: BTreeMap<AttributeKey, f64>,
    /// Sum of weights of the attributes that took part
    pub total_weight: f64,
}

impl ScoreBreakdown {
    fn empty() -> Self {
        Self { score: 0.0, contributions: BTreeMap::new(), total_weight: 0.0 }
    }
}

/// Errors that make a single candidate unscorable
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("attribute '{0}' holds a non-finite number")]
    NonFinite(String),

    #[error("custom similarity for '{key}' returned {value}")]
    InvalidCustomSimilarity { key: String, value: f64 },
}

/// Scores candidates against a target using registry plugins for
/// custom comparisons
#[derive(Debug, Clone, Copy)]
pub struct SimilarityScorer<'a> {
    registry: &'a PluginRegistry,
}

impl<'a> SimilarityScorer<'a> {
    pub fn new(registry: &'a PluginRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a PluginRegistry {
        self.registry
    }

    /// Weighted similarity over the union of attribute keys.
    ///
    /// Metadata keys and attributes with weight 0 are skipped entirely.
    /// Returns 0.0 when no attribute carries weight.
    pub fn score(
        &self,
        target: &AttributeMap,
        candidate: &AttributeMap,
        weights: &WeightConfig,
        tolerances: &ToleranceConfig,
        category: &Category,
    ) -> Result<ScoreBreakdown, ScoreError> {
        let keys: BTreeSet<AttributeKey> = target
            .keys()
            .chain(candidate.keys())
            .filter(|k| !k.is_metadata())
            .collect();

        let mut weighted = Vec::with_capacity(keys.len());
        let mut total_weight = 0.0;
        let mut weighted_sum = 0.0;

        for key in keys {
            let weight = weights.weight(&key);
            if weight <= 0.0 {
                continue;
            }
            let similarity = self.attribute_similarity(
                &key,
                target.get(&key),
                candidate.get(&key),
                tolerances.get(&key),
                category,
            )?;
            total_weight += weight;
            weighted_sum += weight * similarity;
            weighted.push((key, weight, similarity));
        }

        if total_weight <= 0.0 {
            return Ok(ScoreBreakdown::empty());
        }

        let contributions = weighted
            .into_iter()
            .map(|(key, weight, similarity)| (key, weight * similarity / total_weight))
            .collect();
        let score = (weighted_sum / total_weight).clamp(0.0, 1.0);

        Ok(ScoreBreakdown { score, contributions, total_weight })
    }

    /// Similarity of one attribute.
    ///
    /// Order: plugin custom function, both values neutral, exact tolerance,
    /// list equality, remaining tolerances, neutral default for
    /// unconfigured attributes. An exact mismatch scores 0.0 for lists too.
    pub fn attribute_similarity(
        &self,
        key: &AttributeKey,
        target: Option<&AttributeValue>,
        candidate: Option<&AttributeValue>,
        tolerance: Option<&Tolerance>,
        category: &Category,
    ) -> Result<f64, ScoreError> {
        for value in [target, candidate].into_iter().flatten() {
            if !value.is_finite() {
                return Err(ScoreError::NonFinite(key.to_string()));
            }
        }

        if let Some(custom) = self.registry.custom_similarity(category, key, target, candidate) {
            if !custom.is_finite() {
                return Err(ScoreError::InvalidCustomSimilarity {
                    key: key.to_string(),
                    value: custom,
                });
            }
            return Ok(custom.clamp(0.0, 1.0));
        }

        let a = target.unwrap_or(&ZERO);
        let b = candidate.unwrap_or(&ZERO);

        if a.is_default() && b.is_default() {
            return Ok(1.0);
        }

        if matches!(tolerance, Some(Tolerance::Exact)) {
            return Ok(exact_similarity(a, b));
        }

        if matches!(a, AttributeValue::List(_)) || matches!(b, AttributeValue::List(_)) {
            return Ok(list_similarity(a, b));
        }

        let similarity = match tolerance {
            Some(Tolerance::Exact) => exact_similarity(a, b),
            Some(Tolerance::Relative { tau }) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => relative_similarity(x, y, *tau),
                _ => exact_similarity(a, b),
            },
            Some(Tolerance::Tiered { bounds, step_penalty }) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => tiered_similarity(x, y, bounds, *step_penalty),
                _ => exact_similarity(a, b),
            },
            None => neutral_similarity(a, b),
        };

        Ok(similarity)
    }
}
