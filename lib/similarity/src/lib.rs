//! # AnchorX Similarity
//!
//! Category-aware multi-attribute similarity for market listings.
//!
//! ## Features
//!
//! - **Weight / tolerance configs**: per-attribute weights plus exact,
//!   relative-band or tiered comparisons
//! - **Category plugins**: per-category adjustments, derived 0-100 scores
//!   and custom attribute comparisons behind one fixed trait
//! - **Plugin registry**: built once at startup, read-only afterwards
//! - **Explainability**: per-attribute contributions for every score
//!
//! ## Example
//!
//! ```rust
//! use anchorx_core::{AttributeMap, Category};
//! use anchorx_similarity::{plugins, PluginRegistry, SimilarityScorer};
//!
//! let registry = plugins::register_builtin_plugins(PluginRegistry::builder())
//!     .build()
//!     .unwrap();
//! let weapon = Category::new("weapon");
//!
//! let target = AttributeMap::new().with("level", 80.0).with("gem_level", 5.0);
//! let listing = AttributeMap::new().with("level", 80.0).with("gem_level", 6.0);
//!
//! let weights = registry.resolve_weights(&weapon, &target).unwrap();
//! let tolerances = registry.resolve_tolerances(&weapon, &target).unwrap();
//! let target = registry.enrich(&weapon, &target, None);
//! let listing = registry.enrich(&weapon, &listing, None);
//!
//! let scorer = SimilarityScorer::new(&registry);
//! let result = scorer.score(&target, &listing, &weights, &tolerances, &weapon).unwrap();
//! assert!(result.score > 0.5 && result.score <= 1.0);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Plugins   │────>│  Registry   │────>│  Weights /  │
//! │ (category)  │     │ (immutable) │     │ Tolerances  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │                   │
//!                            │  derived / custom │
//!                            v                   v
//!                     ┌──────────────────────────────┐
//!                     │      SimilarityScorer        │
//!                     │ (target vs candidate, 0..1)  │
//!                     └──────────────────────────────┘
//! ```

pub mod config;
pub mod declarative;
pub mod derived;
pub mod distance;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod scorer;

// Re-export main types for convenience
pub use config::{
    BaseDefaults,
    ConfigError,
    Tolerance,
    ToleranceAdjustments,
    ToleranceConfig,
    WeightAdjustments,
    WeightConfig,
};
pub use declarative::{DeclarativePlugin, PluginSpec};
pub use derived::{DerivedRule, SourceMode};
pub use plugin::{CategoryPlugin, DerivedFeature, PluginContext};
pub use registry::{OverridePrecedence, PluginRegistry, PluginRegistryBuilder};
pub use scorer::{ScoreBreakdown, ScoreError, SimilarityScorer};
