//! Anchor selection
//!
//! Scores every retrieved candidate, keeps those at or above the
//! threshold and returns the best `max_anchors` in descending similarity
//! order. Ties keep retrieval order.

use anchorx_core::{Anchor, AttributeKey, AttributeMap, Candidate, Category, Error};
use anchorx_similarity::{PluginContext, SimilarityScorer, ToleranceConfig, WeightConfig};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Counters describing one anchor search
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub candidates_fetched: usize,
    /// The target's own listing was among the candidates
    pub excluded_self: usize,
    /// Candidates skipped because they could not be scored
    pub scoring_errors: usize,
    pub below_threshold: usize,
    /// Anchors dropped by the `max_anchors` cap
    pub truncated: usize,
    pub outliers_removed: usize,
    pub outlier_filter_reverted: bool,
    pub best_similarity: Option<f64>,
    pub mean_similarity: Option<f64>,
    /// Attribute with the largest summed contribution across anchors
    pub top_attribute: Option<AttributeKey>,
}

impl SearchStats {
    /// Fill the similarity summary from the final anchor set
    pub fn summarize(&mut self, anchors: &[Anchor]) {
        if anchors.is_empty() {
            self.best_similarity = None;
            self.mean_similarity = None;
            self.top_attribute = None;
            return;
        }
        self.best_similarity =
            anchors.iter().map(|a| OrderedFloat(a.similarity)).max().map(|s| s.0);
        let total: f64 = anchors.iter().map(|a| a.similarity).sum();
        self.mean_similarity = Some(total / anchors.len() as f64);

        let mut totals: BTreeMap<&AttributeKey, f64> = BTreeMap::new();
        for anchor in anchors {
            for (key, contribution) in &anchor.contributions {
                *totals.entry(key).or_insert(0.0) += contribution;
            }
        }
        self.top_attribute = totals
            .into_iter()
            .max_by_key(|(_, total)| OrderedFloat(*total))
            .map(|(key, _)| key.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSelector {
    pub similarity_threshold: f64,
    pub max_anchors: usize,
}

/// Everything the selector needs to score one target
pub struct ScoringInput<'a> {
    pub category: &'a Category,
    /// Target attributes with derived features already merged
    pub target: &'a AttributeMap,
    pub target_id: Option<&'a str>,
    pub weights: &'a WeightConfig,
    pub tolerances: &'a ToleranceConfig,
    pub context: Option<&'a PluginContext>,
}

impl AnchorSelector {
    pub fn new(similarity_threshold: f64, max_anchors: usize) -> Self {
        Self { similarity_threshold, max_anchors }
    }

    pub fn select(
        &self,
        scorer: SimilarityScorer<'_>,
        input: &ScoringInput<'_>,
        candidates: Vec<Candidate>,
        stats: &mut SearchStats,
    ) -> Vec<Anchor> {
        let registry = scorer.registry();
        let capacity = candidates.len().min(self.max_anchors.saturating_mul(2));
        let mut anchors = Vec::with_capacity(capacity);

        for candidate in candidates {
            if input.target_id == Some(candidate.id.as_str()) {
                stats.excluded_self += 1;
                continue;
            }

            match self.score_one(scorer, input, &candidate) {
                Ok(breakdown) if breakdown.score >= self.similarity_threshold => {
                    anchors.push(Anchor {
                        candidate,
                        similarity: breakdown.score,
                        contributions: breakdown.contributions,
                    });
                }
                Ok(_) => stats.below_threshold += 1,
                Err(e) => {
                    tracing::warn!(
                        category = %input.category,
                        candidate = %candidate.id,
                        error = %e,
                        "skipping candidate"
                    );
                    stats.scoring_errors += 1;
                }
            }
        }

        // stable: equal similarities keep retrieval order
        anchors.sort_by_key(|a| Reverse(OrderedFloat(a.similarity)));
        if anchors.len() > self.max_anchors {
            stats.truncated += anchors.len() - self.max_anchors;
            anchors.truncate(self.max_anchors);
        }

        tracing::debug!(
            category = %input.category,
            registry_plugins = registry.plugins_for(input.category).len(),
            kept = anchors.len(),
            below_threshold = stats.below_threshold,
            errors = stats.scoring_errors,
            "anchors selected"
        );
        anchors
    }

    fn score_one(
        &self,
        scorer: SimilarityScorer<'_>,
        input: &ScoringInput<'_>,
        candidate: &Candidate,
    ) -> Result<anchorx_similarity::ScoreBreakdown, Error> {
        if !candidate.price.is_finite() || candidate.price < 0.0 {
            return Err(Error::scoring(&candidate.id, format!("invalid price {}", candidate.price)));
        }
        let enriched =
            scorer.registry().enrich(input.category, &candidate.attributes, input.context);
        scorer
            .score(input.target, &enriched, input.weights, input.tolerances, input.category)
            .map_err(|e| Error::scoring(&candidate.id, e))
    }
}
