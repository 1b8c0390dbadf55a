//! Valuation engine
//!
//! Composes the pipeline:
//!
//! ```text
//! request ─> guard ─┬─> invalid result (no retrieval)
//!                   └─> pre-filter ─> collector ─> selector ─> outlier filter ─> aggregator
//! ```
//!
//! The engine holds only read-only state (registry, collector handle and
//! settings), so one instance can serve concurrent calls.

use crate::aggregate::{PriceAggregator, PricingStrategy, ValuationResult};
use crate::guard::InvalidItemGuard;
use crate::outlier::ExtremeValueFilter;
use crate::report::DistributionReport;
use crate::selector::{AnchorSelector, ScoringInput, SearchStats};
use crate::settings::EngineSettings;
use anchorx_core::{Anchor, AttributeMap, AttributeValue, Category, Error, FilterSpec, Result};
use anchorx_market::{MarketDataCollector, PreFilterBuilder};
use anchorx_similarity::{PluginContext, PluginRegistry, SimilarityScorer};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One item to value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationRequest {
    /// Listing id of the item itself, excluded from its own anchors.
    /// Falls back to a raw `id` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub category: Category,
    pub attributes: AttributeMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<PricingStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_anchors: Option<usize>,
    #[serde(skip)]
    pub context: Option<PluginContext>,
}

impl ValuationRequest {
    pub fn new(category: impl Into<Category>, attributes: AttributeMap) -> Self {
        Self {
            item_id: None,
            category: category.into(),
            attributes,
            strategy: None,
            similarity_threshold: None,
            max_anchors: None,
            context: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.item_id = Some(id.into());
        self
    }

    pub fn with_strategy(mut self, strategy: PricingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn with_max_anchors(mut self, max_anchors: usize) -> Self {
        self.max_anchors = Some(max_anchors);
        self
    }

    pub fn with_context(mut self, context: PluginContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Own listing id. A numeric `id` attribute is read in its
    /// listing form, so `42` matches listing `"42"`.
    fn target_id(&self) -> Option<Cow<'_, str>> {
        if let Some(id) = self.item_id.as_deref() {
            return Some(Cow::Borrowed(id));
        }
        match self.attributes.raw("id")? {
            AttributeValue::Text(id) => Some(Cow::Borrowed(id.as_str())),
            AttributeValue::Number(n) if n.is_finite() => Some(Cow::Owned(n.to_string())),
            _ => None,
        }
    }
}

/// Anchors plus the counters gathered while finding them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorSearch {
    pub anchors: Vec<Anchor>,
    pub stats: SearchStats,
    /// Filter handed to the collector
    pub filter: FilterSpec,
}

pub struct ValuationEngine {
    registry: Arc<PluginRegistry>,
    collector: Arc<dyn MarketDataCollector>,
    settings: EngineSettings,
    prefilter: PreFilterBuilder,
    outliers: ExtremeValueFilter,
    guard: InvalidItemGuard,
    aggregator: PriceAggregator,
}

impl ValuationEngine {
    /// Engine with default settings, adopting the registry's override
    /// precedence
    pub fn new(registry: Arc<PluginRegistry>, collector: Arc<dyn MarketDataCollector>) -> Self {
        let settings =
            EngineSettings { override_precedence: registry.precedence(), ..Default::default() };
        Self::assemble(registry, collector, settings)
    }

    /// Fails when `settings` name an override precedence the registry was
    /// not built with.
    pub fn with_settings(
        registry: Arc<PluginRegistry>,
        collector: Arc<dyn MarketDataCollector>,
        settings: EngineSettings,
    ) -> Result<Self> {
        settings.validate()?;
        if settings.override_precedence != registry.precedence() {
            return Err(Error::configuration(
                "*",
                format!(
                    "settings ask for {:?} but the registry was built with {:?}",
                    settings.override_precedence,
                    registry.precedence()
                ),
            ));
        }
        Ok(Self::assemble(registry, collector, settings))
    }

    fn assemble(
        registry: Arc<PluginRegistry>,
        collector: Arc<dyn MarketDataCollector>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            prefilter: PreFilterBuilder::new(settings.prefilter.clone()),
            outliers: ExtremeValueFilter::new(settings.outlier_multiplier, settings.outlier_floor),
            guard: InvalidItemGuard::new(settings.guard.clone()),
            aggregator: settings.aggregator,
            registry,
            collector,
            settings,
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Pre-filter, retrieve, score, select and drop price outliers.
    ///
    /// Retrieval and configuration failures are returned; a candidate that
    /// cannot be scored is skipped and counted in the stats.
    pub fn find_market_anchors(&self, request: &ValuationRequest) -> Result<AnchorSearch> {
        let threshold = request.similarity_threshold.unwrap_or(self.settings.similarity_threshold);
        let max_anchors = request.max_anchors.unwrap_or(self.settings.max_anchors);
        self.search(request, threshold, max_anchors)
    }

    fn search(
        &self,
        request: &ValuationRequest,
        threshold: f64,
        max_anchors: usize,
    ) -> Result<AnchorSearch> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidRequest(format!(
                "similarity threshold {} outside [0, 1]",
                threshold
            )));
        }
        if max_anchors == 0 {
            return Err(Error::InvalidRequest("max_anchors must be positive".to_string()));
        }

        let category = &request.category;
        let context = request.context.as_ref();
        let weights = self.registry.resolve_weights(category, &request.attributes)?;
        let tolerances = self.registry.resolve_tolerances(category, &request.attributes)?;
        let target = self.registry.enrich(category, &request.attributes, context);

        let filter = self.prefilter.build(&self.registry, category, &request.attributes);
        let candidates = self.collector.fetch_candidates(&filter).map_err(|e| match e {
            Error::CandidateRetrieval { .. } => e,
            other => Error::retrieval(self.collector.name(), other),
        })?;

        let mut stats = SearchStats { candidates_fetched: candidates.len(), ..Default::default() };
        let target_id = request.target_id();
        let input = ScoringInput {
            category,
            target: &target,
            target_id: target_id.as_deref(),
            weights: &weights,
            tolerances: &tolerances,
            context,
        };
        let selected = AnchorSelector::new(threshold, max_anchors).select(
            SimilarityScorer::new(&self.registry),
            &input,
            candidates,
            &mut stats,
        );

        let filtered = self.outliers.apply(selected);
        stats.outliers_removed = filtered.removed;
        stats.outlier_filter_reverted = filtered.reverted;
        stats.summarize(&filtered.anchors);

        debug!(
            category = %category,
            collector = self.collector.name(),
            fetched = stats.candidates_fetched,
            anchors = filtered.anchors.len(),
            outliers = stats.outliers_removed,
            "anchor search complete"
        );
        Ok(AnchorSearch { anchors: filtered.anchors, stats, filter })
    }

    /// Like [`calculate_value`](Self::calculate_value) but returns
    /// retrieval, configuration and request errors instead of folding
    /// them into the result.
    pub fn try_calculate_value(&self, request: &ValuationRequest) -> Result<ValuationResult> {
        let strategy = request.strategy.unwrap_or(self.settings.default_strategy);

        let invalid = self.guard.check(&self.registry, &request.category, &request.attributes);
        if let Some(reason) = invalid {
            info!(
                category = %request.category,
                reason = %reason,
                "invalid item, skipping retrieval"
            );
            return Ok(ValuationResult::invalid(strategy, reason, self.guard.salvage_value())
                .with_item_id(request.item_id.clone()));
        }

        let search = self.find_market_anchors(request)?;
        let result = self.aggregator.aggregate(&search.anchors, strategy);
        Ok(result.with_item_id(request.item_id.clone()))
    }

    /// Value one item. Never fails: errors come back as a result with
    /// price 0, [`ValuationStatus::Failed`](crate::ValuationStatus::Failed)
    /// and the error message.
    pub fn calculate_value(&self, request: &ValuationRequest) -> ValuationResult {
        match self.try_calculate_value(request) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    category = %request.category,
                    item = ?request.item_id,
                    error = %e,
                    "valuation failed"
                );
                let strategy = request.strategy.unwrap_or(self.settings.default_strategy);
                ValuationResult::failed(strategy, e).with_item_id(request.item_id.clone())
            }
        }
    }

    /// Value every request; results keep request order and one failing
    /// item never affects the others.
    pub fn batch_valuation(&self, requests: &[ValuationRequest]) -> Vec<ValuationResult> {
        let mut tagged: Vec<(usize, ValuationResult)> = if self.settings.parallel_batch {
            requests
                .par_iter()
                .enumerate()
                .map(|(i, request)| (i, self.calculate_value(request)))
                .collect()
        } else {
            requests
                .iter()
                .enumerate()
                .map(|(i, request)| (i, self.calculate_value(request)))
                .collect()
        };
        tagged.sort_by_key(|(i, _)| *i);

        let failed = tagged.iter().filter(|(_, r)| !r.is_ok()).count();
        info!(items = requests.len(), not_ok = failed, "batch valuation complete");
        tagged.into_iter().map(|(_, result)| result).collect()
    }

    /// Distribution of comparable prices with a relaxed threshold and a
    /// larger anchor cap than a normal valuation
    pub fn value_distribution_report(
        &self,
        request: &ValuationRequest,
    ) -> Result<DistributionReport> {
        let (threshold, cap) = (self.settings.report_threshold, self.settings.report_max_anchors);
        let search = self.search(request, threshold, cap)?;
        Ok(DistributionReport::build(
            request.category.clone(),
            &search.anchors,
            search.stats,
            &self.aggregator,
            self.settings.histogram_bins,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ValuationStatus, NO_ANCHORS};
    use anchorx_core::Candidate;
    use anchorx_market::InMemoryCollector;
    use anchorx_similarity::plugins::register_builtin_plugins;
    use anchorx_similarity::OverridePrecedence;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn sword(level: f64, damage: f64, strength: f64) -> AttributeMap {
        AttributeMap::new()
            .with("level", level)
            .with("damage", damage)
            .with("strength", strength)
    }

    fn builtin_registry() -> Arc<PluginRegistry> {
        Arc::new(register_builtin_plugins(PluginRegistry::builder()).build().unwrap())
    }

    fn engine_with(listings: Vec<Candidate>) -> ValuationEngine {
        init_tracing();
        let registry = builtin_registry();
        let store = InMemoryCollector::with_registry(registry.clone());
        store.batch_upsert(&Category::new("weapon"), listings).unwrap();
        ValuationEngine::new(registry, Arc::new(store))
    }

    fn market() -> Vec<Candidate> {
        vec![
            Candidate::new("s1", sword(80.0, 400.0, 30.0), 100.0),
            Candidate::new("s2", sword(80.0, 405.0, 31.0), 105.0),
            Candidate::new("s3", sword(81.0, 398.0, 29.0), 98.0),
            Candidate::new("s4", sword(80.0, 402.0, 30.0), 102.0),
            Candidate::new("s5", sword(80.0, 401.0, 30.0), 5000.0),
            // outside the level band
            Candidate::new("old", sword(40.0, 200.0, 30.0), 10.0),
        ]
    }

    #[test]
    fn test_outlier_removed_from_anchors() {
        let engine = engine_with(market());
        let request = ValuationRequest::new("weapon", sword(80.0, 400.0, 30.0));
        let search = engine.find_market_anchors(&request).unwrap();

        assert_eq!(search.stats.candidates_fetched, 5);
        assert_eq!(search.stats.outliers_removed, 1);
        assert_eq!(search.anchors.len(), 4);
        assert!(search.anchors.iter().all(|a| a.price() < 1000.0));
        assert!(search.anchors.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_calculate_value() {
        let engine = engine_with(market());
        let request = ValuationRequest::new("weapon", sword(80.0, 400.0, 30.0))
            .with_strategy(PricingStrategy::Competitive);
        let result = engine.calculate_value(&request);

        assert_eq!(result.status, ValuationStatus::Ok);
        assert_eq!(result.anchor_count, 4);
        // sorted 98 100 102 105, index 1 -> 100 * 0.90
        assert_eq!(result.estimated_price, 90.0);
        assert_eq!(result.strategy, PricingStrategy::Competitive);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
    }

    #[test]
    fn test_self_is_excluded() {
        let engine = engine_with(market());
        let request = ValuationRequest::new("weapon", sword(80.0, 400.0, 30.0)).with_id("s1");
        let search = engine.find_market_anchors(&request).unwrap();
        assert_eq!(search.stats.excluded_self, 1);
        assert!(search.anchors.iter().all(|a| a.id() != "s1"));
    }

    #[test]
    fn test_no_anchors() {
        let engine = engine_with(Vec::new());
        let request = ValuationRequest::new("weapon", sword(80.0, 400.0, 30.0));
        let result = engine.calculate_value(&request);
        assert_eq!(result.estimated_price, 0.0);
        assert_eq!(result.anchor_count, 0);
        assert_eq!(result.error.as_deref(), Some(NO_ANCHORS));
    }

    #[test]
    fn test_invalid_request_folds_into_result() {
        let engine = engine_with(market());
        let request = ValuationRequest::new("weapon", sword(80.0, 400.0, 30.0)).with_threshold(2.0);
        assert!(engine.try_calculate_value(&request).is_err());

        let result = engine.calculate_value(&request);
        assert_eq!(result.status, ValuationStatus::Failed);
        assert_eq!(result.estimated_price, 0.0);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_invalid_item_short_circuits() {
        let engine = engine_with(market());
        let request = ValuationRequest::new("weapon", sword(0.0, 400.0, 30.0)).with_id("x");
        let result = engine.calculate_value(&request);
        assert_eq!(result.status, ValuationStatus::Invalid);
        assert_eq!(result.item_id.as_deref(), Some("x"));
        assert!(result.skip_reason.is_some());
    }

    #[test]
    fn test_distribution_report_uses_relaxed_threshold() {
        let engine = engine_with(market());
        let request = ValuationRequest::new("weapon", sword(80.0, 400.0, 30.0)).with_max_anchors(1);
        let report = engine.value_distribution_report(&request).unwrap();
        // the request cap is ignored in favour of the report cap
        assert_eq!(report.anchor_count, 4);
        assert!(report.recommended_fair_value > 0.0);
        assert!(report.recommended_competitive <= report.recommended_fair_value);
    }

    #[test]
    fn test_parallel_batch_keeps_order() {
        init_tracing();
        let registry = builtin_registry();
        let store = InMemoryCollector::with_registry(registry.clone());
        store.batch_upsert(&Category::new("weapon"), market()).unwrap();
        let settings = EngineSettings { parallel_batch: true, ..Default::default() };
        let engine = ValuationEngine::with_settings(registry, Arc::new(store), settings).unwrap();

        let requests: Vec<ValuationRequest> = (0..16)
            .map(|i| {
                let level = if i % 4 == 0 { 0.0 } else { 80.0 };
                ValuationRequest::new("weapon", sword(level, 400.0, 30.0))
                    .with_id(format!("item-{}", i))
            })
            .collect();
        let results = engine.batch_valuation(&requests);

        assert_eq!(results.len(), 16);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.item_id.as_deref(), Some(format!("item-{}", i).as_str()));
            let expected = if i % 4 == 0 { ValuationStatus::Invalid } else { ValuationStatus::Ok };
            assert_eq!(result.status, expected);
        }
    }

    #[test]
    fn test_precedence_mismatch_is_configuration_error() {
        let registry = builtin_registry();
        let settings = EngineSettings {
            override_precedence: OverridePrecedence::LowestPriorityWins,
            ..Default::default()
        };
        let store = Arc::new(InMemoryCollector::new());
        let result = ValuationEngine::with_settings(registry, store, settings);
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_new_adopts_registry_precedence() {
        let registry = Arc::new(
            register_builtin_plugins(PluginRegistry::builder())
                .override_precedence(OverridePrecedence::LowestPriorityWins)
                .build()
                .unwrap(),
        );
        let engine = ValuationEngine::new(registry, Arc::new(InMemoryCollector::new()));
        assert_eq!(engine.settings().override_precedence, OverridePrecedence::LowestPriorityWins);
    }

    #[test]
    fn test_numeric_id_attribute_excludes_own_listing() {
        let mut listings = market();
        listings.push(Candidate::new("42", sword(80.0, 400.0, 30.0), 100.0));
        let engine = engine_with(listings);

        let request = ValuationRequest::new("weapon", sword(80.0, 400.0, 30.0).with("id", 42.0));
        let search = engine.find_market_anchors(&request).unwrap();
        assert_eq!(search.stats.excluded_self, 1);
        assert!(search.anchors.iter().all(|a| a.id() != "42"));
    }
}
