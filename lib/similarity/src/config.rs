//! Weight and tolerance configuration
//!
//! Resolved per category by the plugin registry: a base default map is
//! merged with the increments and overrides of every applicable plugin.

use anchorx_core::AttributeKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How two values of one attribute are compared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Tolerance {
    /// 1.0 if equal, 0.0 otherwise
    Exact,
    /// Relative difference band: full similarity up to `tau`,
    /// linear decay to 0 at `2 * tau`
    Relative { tau: f64 },
    /// Values are bucketed by ascending `bounds`; each bucket of
    /// distance costs `step_penalty`
    Tiered { bounds: Vec<f64>, step_penalty: f64 },
}

impl Tolerance {
    pub fn relative(tau: f64) -> Self {
        if tau <= 0.0 {
            Tolerance::Exact
        } else {
            Tolerance::Relative { tau }
        }
    }

    /// Widen a relative band. Exact counts as a band of width 0;
    /// tiered tolerances are left unchanged.
    pub fn widened(&self, increment: f64) -> Self {
        match self {
            Tolerance::Exact => Tolerance::relative(increment),
            Tolerance::Relative { tau } => Tolerance::relative(tau + increment),
            Tolerance::Tiered { .. } => self.clone(),
        }
    }

    fn validate(&self, key: &AttributeKey) -> Result<(), ConfigError> {
        match self {
            Tolerance::Exact => Ok(()),
            Tolerance::Relative { tau } => {
                if !tau.is_finite() || *tau < 0.0 {
                    return Err(ConfigError::InvalidTolerance(key.to_string()));
                }
                Ok(())
            }
            Tolerance::Tiered { bounds, step_penalty } => {
                if bounds.is_empty() {
                    return Err(ConfigError::EmptyTiers(key.to_string()));
                }
                let unsorted = bounds.windows(2).any(|w| w[0] >= w[1]);
                if unsorted || bounds.iter().any(|b| !b.is_finite()) {
                    return Err(ConfigError::UnsortedTiers(key.to_string()));
                }
                if !step_penalty.is_finite() || *step_penalty < 0.0 {
                    return Err(ConfigError::InvalidTolerance(key.to_string()));
                }
                Ok(())
            }
        }
    }
}

fn default_fallback_weight() -> f64 {
    1.0
}

/// Per-attribute weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(default)]
    pub weights: BTreeMap<AttributeKey, f64>,

    /// Weight of attributes with no explicit entry
    #[serde(default = "default_fallback_weight")]
    pub fallback: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self { weights: BTreeMap::new(), fallback: default_fallback_weight() }
    }
}

impl WeightConfig {
    pub fn new(weights: BTreeMap<AttributeKey, f64>) -> Self {
        Self { weights, fallback: default_fallback_weight() }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<AttributeKey>, weight: f64) -> Self {
        self.weights.insert(key.into(), weight);
        self
    }

    /// Effective weight of an attribute
    pub fn weight(&self, key: &AttributeKey) -> f64 {
        self.weights.get(key).copied().unwrap_or(self.fallback)
    }

    pub fn set(&mut self, key: AttributeKey, weight: f64) {
        self.weights.insert(key, weight);
    }

    pub fn add(&mut self, key: AttributeKey, increment: f64) {
        let current = self.weight(&key);
        self.weights.insert(key, current + increment);
    }

    /// Checks that every weight is finite and non-negative
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fallback.is_finite() || self.fallback < 0.0 {
            return Err(ConfigError::NegativeWeight("<fallback>".to_string()));
        }
        for (key, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ConfigError::NegativeWeight(key.to_string()));
            }
        }
        Ok(())
    }
}

/// Per-attribute tolerances. Attributes without an entry are
/// "unconfigured" and use the neutral default comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToleranceConfig {
    #[serde(default)]
    pub tolerances: BTreeMap<AttributeKey, Tolerance>,
}

impl ToleranceConfig {
    pub fn new(tolerances: BTreeMap<AttributeKey, Tolerance>) -> Self {
        Self { tolerances }
    }

    pub fn with(mut self, key: impl Into<AttributeKey>, tolerance: Tolerance) -> Self {
        self.tolerances.insert(key.into(), tolerance);
        self
    }

    pub fn get(&self, key: &AttributeKey) -> Option<&Tolerance> {
        self.tolerances.get(key)
    }

    pub fn set(&mut self, key: AttributeKey, tolerance: Tolerance) {
        self.tolerances.insert(key, tolerance);
    }

    /// Widen the band of `key`; an unconfigured attribute becomes a
    /// relative band of width `increment`
    pub fn widen(&mut self, key: AttributeKey, increment: f64) {
        let next = match self.tolerances.get(&key) {
            Some(current) => current.widened(increment),
            None => Tolerance::relative(increment),
        };
        self.tolerances.insert(key, next);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, tolerance) in &self.tolerances {
            tolerance.validate(key)?;
        }
        Ok(())
    }
}

/// Base configuration every category starts from before plugins apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseDefaults {
    #[serde(default)]
    pub weights: WeightConfig,
    #[serde(default)]
    pub tolerances: ToleranceConfig,
}

impl Default for BaseDefaults {
    fn default() -> Self {
        Self::standard()
    }
}

impl BaseDefaults {
    /// Defaults shared by every item category
    pub fn standard() -> Self {
        let weights = WeightConfig::default()
            .with("level", 3.0)
            .with("special_skill", 2.0)
            .with("special_effects", 2.0)
            .with("flaws", 1.0);

        let tolerances = ToleranceConfig::default()
            .with("level", Tolerance::relative(0.05))
            .with("special_skill", Tolerance::Exact)
            .with("flaws", Tolerance::relative(0.5));

        Self { weights, tolerances }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.tolerances.validate()
    }
}

/// Adjustments a plugin makes to the weight map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightAdjustments {
    /// Added to the current weight
    #[serde(default)]
    pub increments: BTreeMap<AttributeKey, f64>,
    /// Replace the current weight
    #[serde(default)]
    pub overrides: BTreeMap<AttributeKey, f64>,
}

impl WeightAdjustments {
    pub fn is_empty(&self) -> bool {
        self.increments.is_empty() && self.overrides.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, weight) in self.overrides.iter().chain(self.increments.iter()) {
            if !weight.is_finite() {
                return Err(ConfigError::NegativeWeight(key.to_string()));
            }
        }
        for (key, weight) in &self.overrides {
            if *weight < 0.0 {
                return Err(ConfigError::NegativeWeight(key.to_string()));
            }
        }
        Ok(())
    }
}

/// Adjustments a plugin makes to the tolerance map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToleranceAdjustments {
    /// Widen relative bands by this much
    #[serde(default)]
    pub increments: BTreeMap<AttributeKey, f64>,
    #[serde(default)]
    pub overrides: BTreeMap<AttributeKey, Tolerance>,
}

impl ToleranceAdjustments {
    pub fn is_empty(&self) -> bool {
        self.increments.is_empty() && self.overrides.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, inc) in &self.increments {
            if !inc.is_finite() {
                return Err(ConfigError::InvalidTolerance(key.to_string()));
            }
        }
        for (key, tolerance) in &self.overrides {
            tolerance.validate(key)?;
        }
        Ok(())
    }
}

/// Errors found while validating weight, tolerance or plugin configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Attribute '{0}' has a negative or non-finite weight")]
    NegativeWeight(String),

    #[error("Attribute '{0}' has a negative or non-finite tolerance")]
    InvalidTolerance(String),

    #[error("Attribute '{0}' uses tiered tolerance without tiers")]
    EmptyTiers(String),

    #[error("Attribute '{0}' has tier bounds that are not strictly ascending")]
    UnsortedTiers(String),

    #[error("Derived rule '{0}' has an empty or unsorted lookup table")]
    InvalidLookupTable(String),

    #[error("Plugin '{0}' declares no name")]
    MissingName(String),

    #[error("Failed to parse plugin definition: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_fallback() {
        let weights = WeightConfig::default().with("level", 3.0);
        assert_eq!(weights.weight(&AttributeKey::raw("level")), 3.0);
        assert_eq!(weights.weight(&AttributeKey::raw("unknown")), 1.0);
    }

    #[test]
    fn test_weight_add_starts_from_effective_weight() {
        let mut weights = WeightConfig::default().with("level", 3.0);
        weights.add(AttributeKey::raw("level"), 1.5);
        weights.add(AttributeKey::raw("new"), 1.0);

        assert_eq!(weights.weight(&AttributeKey::raw("level")), 4.5);
        assert_eq!(weights.weight(&AttributeKey::raw("new")), 2.0);
    }

    #[test]
    fn test_negative_weight_error() {
        let weights = WeightConfig::default().with("level", -1.0);
        assert!(matches!(weights.validate(), Err(ConfigError::NegativeWeight(_))));
    }

    #[test]
    fn test_tolerance_widening() {
        assert_eq!(Tolerance::Exact.widened(0.1), Tolerance::Relative { tau: 0.1 });
        assert_eq!(Tolerance::relative(0.1).widened(0.1), Tolerance::Relative { tau: 0.2 });
        assert_eq!(Tolerance::relative(0.0), Tolerance::Exact);

        let tiered = Tolerance::Tiered { bounds: vec![1.0, 2.0], step_penalty: 0.5 };
        assert_eq!(tiered.widened(0.3), tiered);
    }

    #[test]
    fn test_tier_validation() {
        let bad = ToleranceConfig::default()
            .with("growth", Tolerance::Tiered { bounds: vec![1.2, 1.1], step_penalty: 0.3 });
        assert!(matches!(bad.validate(), Err(ConfigError::UnsortedTiers(_))));

        let empty = ToleranceConfig::default()
            .with("growth", Tolerance::Tiered { bounds: vec![], step_penalty: 0.3 });
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyTiers(_))));
    }

    #[test]
    fn test_standard_defaults_are_valid() {
        assert!(BaseDefaults::standard().validate().is_ok());
    }

    #[test]
    fn test_serde_roundtrip() {
        let defaults = BaseDefaults::standard();
        let json = serde_json::to_string(&defaults).unwrap();
        let parsed: BaseDefaults = serde_json::from_str(&json).unwrap();
        assert_eq!(defaults, parsed);
        assert!(json.contains("\"mode\":\"relative\""));
    }
}
