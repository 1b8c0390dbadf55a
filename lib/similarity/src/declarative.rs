//! Declarative plugins
//!
//! A plugin described entirely by data, loadable from JSON. Covers the
//! common case where a category only needs different weights, tolerances
//! and lookup-table scores.

use crate::config::{ConfigError, Tolerance, ToleranceAdjustments, WeightAdjustments};
use crate::derived::DerivedRule;
use crate::plugin::{CategoryPlugin, DerivedFeature, PluginContext};
use anchorx_core::{AttributeKey, AttributeMap, Category, EntityFamily};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable plugin definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,

    /// Empty applies the plugin to every category
    #[serde(default)]
    pub categories: Vec<Category>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<EntityFamily>,

    /// Adjustments only apply when the target has a non-default value
    /// for this raw attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_present: Option<String>,

    #[serde(default)]
    pub weight_increments: BTreeMap<AttributeKey, f64>,

    #[serde(default)]
    pub weight_overrides: BTreeMap<AttributeKey, f64>,

    #[serde(default)]
    pub tolerance_increments: BTreeMap<AttributeKey, f64>,

    #[serde(default)]
    pub tolerance_overrides: BTreeMap<AttributeKey, Tolerance>,

    #[serde(default)]
    pub derived: Vec<DerivedRule>,
}

impl PluginSpec {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let spec: PluginSpec =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a JSON array of plugin definitions
    pub fn list_from_json_str(json: &str) -> Result<Vec<Self>, ConfigError> {
        let specs: Vec<PluginSpec> =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        for spec in &specs {
            spec.validate()?;
        }
        Ok(specs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName(format!("{:?}", self.categories)));
        }
        WeightAdjustments {
            increments: self.weight_increments.clone(),
            overrides: self.weight_overrides.clone(),
        }
            .validate()?;
        ToleranceAdjustments {
            increments: self.tolerance_increments.clone(),
            overrides: self.tolerance_overrides.clone(),
        }
        .validate()?;
        for rule in &self.derived {
            rule.validate()?;
        }
        Ok(())
    }
}

/// A [`CategoryPlugin`] backed by a [`PluginSpec`]
#[derive(Debug, Clone)]
pub struct DeclarativePlugin {
    spec: PluginSpec,
    superseded: Vec<String>,
}

impl DeclarativePlugin {
    pub fn new(spec: PluginSpec) -> Result<Self, ConfigError> {
        spec.validate()?;
        let superseded =
            spec.derived.iter().filter_map(|r| r.superseded().map(str::to_string)).collect();
        Ok(Self { spec, superseded })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Self::new(PluginSpec::from_json_str(json)?)
    }

    pub fn spec(&self) -> &PluginSpec {
        &self.spec
    }

    fn active_for(&self, target: &AttributeMap) -> bool {
        match &self.spec.when_present {
            Some(name) => target.raw(name).map(|v| !v.is_default()).unwrap_or(false),
            None => true,
        }
    }
}

impl CategoryPlugin for DeclarativePlugin {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn categories(&self) -> &[Category] {
        &self.spec.categories
    }

    fn priority(&self) -> i32 {
        self.spec.priority
    }

    fn family(&self) -> Option<EntityFamily> {
        self.spec.family
    }

    fn superseded_attributes(&self) -> &[String] {
        &self.superseded
    }

    fn derived_features(
        &self,
        attrs: &AttributeMap,
        _context: Option<&PluginContext>,
    ) -> Vec<DerivedFeature> {
        self.spec
            .derived
            .iter()
            .map(|rule| DerivedFeature::new(rule.name(), rule.evaluate(attrs)))
            .collect()
    }

    fn weight_adjustments(&self, target: &AttributeMap) -> WeightAdjustments {
        if !self.active_for(target) {
            return WeightAdjustments::default();
        }
        WeightAdjustments {
            increments: self.spec.weight_increments.clone(),
            overrides: self.spec.weight_overrides.clone(),
        }
    }

    fn tolerance_adjustments(&self, target: &AttributeMap) -> ToleranceAdjustments {
        if !self.active_for(target) {
            return ToleranceAdjustments::default();
        }
        ToleranceAdjustments {
            increments: self.spec.tolerance_increments.clone(),
            overrides: self.spec.tolerance_overrides.clone(),
        }
    }
}
