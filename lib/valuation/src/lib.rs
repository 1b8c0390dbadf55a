//! # AnchorX Valuation
//!
//! Market-anchor valuation: find comparable listings for a target item,
//! drop price outliers and aggregate the rest into a price estimate with
//! a confidence score.
//!
//! ## Components
//!
//! - [`InvalidItemGuard`] - classifies valueless items before any retrieval
//! - [`AnchorSelector`] - scores, thresholds, sorts and caps candidates
//! - [`ExtremeValueFilter`] - index-quartile IQR filter that fails open
//! - [`PriceAggregator`] - `fair_value` / `competitive` / `premium` pricing
//! - [`ValuationEngine`] - the top-level API composing all of the above
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use anchorx_core::{AttributeMap, Candidate, Category};
//! use anchorx_market::InMemoryCollector;
//! use anchorx_similarity::{plugins, PluginRegistry};
//! use anchorx_valuation::{ValuationEngine, ValuationRequest};
//!
//! let builder = plugins::register_builtin_plugins(PluginRegistry::builder());
//! let registry = Arc::new(builder.build().unwrap());
//! let store = InMemoryCollector::with_registry(registry.clone());
//! let weapon = Category::new("weapon");
//! for (i, price) in [100.0, 104.0, 98.0].iter().enumerate() {
//!     let attrs = AttributeMap::new().with("level", 80.0).with("damage", 400.0);
//!     store.upsert(&weapon, Candidate::new(format!("l{}", i), attrs, *price)).unwrap();
//! }
//!
//! let engine = ValuationEngine::new(registry, Arc::new(store));
//! let target = AttributeMap::new().with("level", 80.0).with("damage", 400.0);
//! let request = ValuationRequest::new("weapon", target);
//! let result = engine.calculate_value(&request);
//! assert_eq!(result.anchor_count, 3);
//! assert!(result.estimated_price > 0.0);
//! ```

pub mod aggregate;
pub mod engine;
pub mod guard;
pub mod outlier;
pub mod report;
pub mod selector;
pub mod settings;
pub mod stats;

pub use aggregate::{
    PriceAggregator, PriceRange, PricingStrategy, ValuationResult, ValuationStatus, NO_ANCHORS,
};
pub use engine::{AnchorSearch, ValuationEngine, ValuationRequest};
pub use guard::{GuardConfig, InvalidItemGuard};
pub use outlier::{ExtremeValueFilter, OutlierReport};
pub use report::{DistributionReport, HistogramBin, Percentiles, PriceStats, SimilarityStats};
pub use selector::{AnchorSelector, ScoringInput, SearchStats};
pub use settings::EngineSettings;
