//! # AnchorX
//!
//! A market-anchor valuation engine: prices an item from comparable
//! market listings using category-aware weighted similarity.
//!
//! Given a target item's attributes, AnchorX asks a market data collector
//! for candidate listings, scores each one against the target, keeps the
//! closest as *anchors*, drops price outliers and aggregates the survivors
//! into an estimate with a confidence score.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use anchorx::prelude::*;
//!
//! // Populate the plugin registry once at startup
//! let settings = EngineSettings::default();
//! let registry = Arc::new(anchorx::bootstrap(&settings, Vec::new()).unwrap());
//!
//! // Any MarketDataCollector works; the in-memory one ships with the crate
//! let store = InMemoryCollector::with_registry(registry.clone());
//! let pets = Category::new("pet");
//! for (id, growth, price) in [("a", 1.22, 300.0), ("b", 1.21, 320.0), ("c", 1.23, 310.0)] {
//!     let attrs = AttributeMap::new().with("level", 45.0).with("growth", growth);
//!     store.upsert(&pets, Candidate::new(id, attrs, price)).unwrap();
//! }
//!
//! let engine = ValuationEngine::with_settings(registry, Arc::new(store), settings).unwrap();
//! let pet = AttributeMap::new().with("level", 45.0).with("growth", 1.22);
//! let request = ValuationRequest::new("pet", pet);
//! let result = engine.calculate_value(&request);
//! assert_eq!(result.status, ValuationStatus::Ok);
//! assert_eq!(result.anchor_count, 3);
//! ```
//!
//! ## Crate Structure
//!
//! AnchorX is composed of several crates:
//!
//! - [`anchorx-core`](https://docs.rs/anchorx-core) - Data model and errors
//! - [`anchorx-similarity`](https://docs.rs/anchorx-similarity) - Plugins and scoring
//! - [`anchorx-market`](https://docs.rs/anchorx-market) - Listing retrieval and pre-filter
//! - [`anchorx-valuation`](https://docs.rs/anchorx-valuation) - Anchor selection and pricing
//!
//! ## Features
//!
//! - **Category plugins**: weights, tolerances, derived scores and custom
//!   comparisons per category, registered explicitly at startup
//! - **Explainable anchors**: per-attribute contributions on every anchor
//! - **Fail-open outlier rejection**: small samples are never emptied
//! - **Three pricing strategies**: fair value, competitive, premium
//! - **Uniform results**: invalid, no-match and failed valuations all come
//!   back as a `ValuationResult`

use std::sync::Arc;
use tracing::info;

// Re-export core types
pub use anchorx_core::{
    Anchor, AttributeKey, AttributeMap, AttributeValue, Candidate, Category, EntityFamily, Error,
    FilterCondition, FilterSpec, Namespace, Result,
};

// Re-export similarity
pub use anchorx_similarity::{
    plugins, BaseDefaults, CategoryPlugin, DeclarativePlugin, DerivedRule, OverridePrecedence,
    PluginContext, PluginRegistry, PluginRegistryBuilder, PluginSpec, ScoreBreakdown,
    SimilarityScorer, Tolerance, ToleranceConfig, WeightConfig,
};

// Re-export market access
pub use anchorx_market::{
    FamilyBands, InMemoryCollector, LevelBand, MarketDataCollector, PreFilterBuilder,
    PreFilterConfig,
};

// Re-export valuation
pub use anchorx_valuation::{
    AnchorSearch, DistributionReport, EngineSettings, ExtremeValueFilter, GuardConfig,
    InvalidItemGuard, PriceAggregator, PriceRange, PricingStrategy, SearchStats, ValuationEngine,
    ValuationRequest, ValuationResult, ValuationStatus,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Anchor, AttributeMap, AttributeValue, Candidate, Category, Error, Result,
        CategoryPlugin, PluginContext, PluginRegistry, PluginSpec,
        FilterSpec, InMemoryCollector, MarketDataCollector,
        EngineSettings, PricingStrategy, ValuationEngine, ValuationRequest, ValuationResult,
        ValuationStatus,
    };
}

/// Build the process-wide plugin registry: built-in plugins plus the
/// given declarative ones, with the override precedence from `settings`.
///
/// Call once at startup; the registry is read-only afterwards.
pub fn bootstrap(settings: &EngineSettings, extra: Vec<PluginSpec>) -> Result<PluginRegistry> {
    let mut builder = plugins::register_builtin_plugins(PluginRegistry::builder())
        .override_precedence(settings.override_precedence);

    for spec in extra {
        let name = spec.name.clone();
        let plugin =
            DeclarativePlugin::new(spec).map_err(|e| Error::configuration(name.as_str(), e))?;
        builder = builder.register(plugin);
    }

    let registry = builder.build()?;
    info!(
        categories = registry.categories().len(),
        precedence = ?registry.precedence(),
        "plugin registry ready"
    );
    Ok(registry)
}

/// [`bootstrap`] with declarative plugins read from a JSON array
pub fn bootstrap_from_json(
    settings: &EngineSettings,
    plugins_json: &str,
) -> Result<PluginRegistry> {
    let specs = PluginSpec::list_from_json_str(plugins_json)
        .map_err(|e| Error::configuration("*", e))?;
    bootstrap(settings, specs)
}

/// Registry, collector and settings wired into an engine
pub fn engine(
    settings: EngineSettings,
    extra: Vec<PluginSpec>,
    collector: Arc<dyn MarketDataCollector>,
) -> Result<ValuationEngine> {
    let registry = Arc::new(bootstrap(&settings, extra)?);
    ValuationEngine::with_settings(registry, collector, settings)
}
