//! Category plugin interface
//!
//! A plugin bundles the category specific knowledge the engine needs:
//! weight and tolerance adjustments, derived features, custom attribute
//! comparisons, pre-filter hints and invalid-item rules. Every plugin
//! implements the same fixed interface; optional capabilities have
//! default implementations that opt out.

use crate::config::{ToleranceAdjustments, WeightAdjustments};
use anchorx_core::{AttributeKey, AttributeMap, AttributeValue, Category, EntityFamily};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Call-scoped context handed to plugins. Always passed, possibly `None`.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    /// Free-form hints from the caller (server, season, reference level...)
    pub hints: BTreeMap<String, Value>,
}

impl PluginContext {
    pub fn with_hint(mut self, name: impl Into<String>, value: Value) -> Self {
        self.hints.insert(name.into(), value);
        self
    }

    pub fn hint(&self, name: &str) -> Option<&Value> {
        self.hints.get(name)
    }
}

/// One entry for the derived attribute namespace
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFeature {
    pub name: String,
    pub value: AttributeValue,
}

impl DerivedFeature {
    pub fn new(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

pub trait CategoryPlugin: Send + Sync + fmt::Debug {
    /// Plugin name, used in logs
    fn name(&self) -> &str;

    /// Categories this plugin applies to. Empty means every category.
    fn categories(&self) -> &[Category];

    /// Higher priority plugins are consulted first
    fn priority(&self) -> i32 {
        0
    }

    /// Entity family of the categories this plugin covers
    fn family(&self) -> Option<EntityFamily> {
        None
    }

    /// Raw attributes replaced by a derived score. Their weight is
    /// forced to 0 during resolution.
    fn superseded_attributes(&self) -> &[String] {
        &[]
    }

    /// Extra attributes for the derived namespace. Called with the same
    /// context for the target and for every candidate.
    fn derived_features(
        &self,
        _attrs: &AttributeMap,
        _context: Option<&PluginContext>,
    ) -> Vec<DerivedFeature> {
        Vec::new()
    }

    fn weight_adjustments(&self, _target: &AttributeMap) -> WeightAdjustments {
        WeightAdjustments::default()
    }

    fn tolerance_adjustments(&self, _target: &AttributeMap) -> ToleranceAdjustments {
        ToleranceAdjustments::default()
    }

    /// Custom comparison for one attribute; `None` defers to the default
    /// algorithm
    fn custom_similarity(
        &self,
        _key: &AttributeKey,
        _target: Option<&AttributeValue>,
        _candidate: Option<&AttributeValue>,
    ) -> Option<f64> {
        None
    }

    /// Category specific pre-filter hints
    fn prefilter_extras(&self, _attrs: &AttributeMap) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    /// Reason the item is obviously valueless, if it is
    fn invalid_reason(&self, _attrs: &AttributeMap) -> Option<String> {
        None
    }

    fn applies_to(&self, category: &Category) -> bool {
        let categories = self.categories();
        categories.is_empty() || categories.contains(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Minimal {
        categories: Vec<Category>,
    }

    impl CategoryPlugin for Minimal {
        fn name(&self) -> &str {
            "minimal"
        }

        fn categories(&self) -> &[Category] {
            &self.categories
        }
    }

    #[test]
    fn test_defaults_opt_out() {
        let plugin = Minimal { categories: vec![Category::new("weapon")] };
        let attrs = AttributeMap::new().with("level", 10.0);

        assert_eq!(plugin.priority(), 0);
        assert!(plugin.family().is_none());
        assert!(plugin.derived_features(&attrs, None).is_empty());
        assert!(plugin.weight_adjustments(&attrs).is_empty());
        assert!(plugin.custom_similarity(&AttributeKey::raw("level"), None, None).is_none());
        assert!(plugin.invalid_reason(&attrs).is_none());
    }

    #[test]
    fn test_applies_to() {
        let scoped = Minimal { categories: vec![Category::new("weapon")] };
        let global = Minimal { categories: vec![] };

        assert!(scoped.applies_to(&Category::new("weapon")));
        assert!(!scoped.applies_to(&Category::new("pet")));
        assert!(global.applies_to(&Category::new("pet")));
    }

    #[test]
    fn test_context_hints() {
        let ctx = PluginContext::default().with_hint("server", serde_json::json!("east-1"));
        assert_eq!(ctx.hint("server"), Some(&serde_json::json!("east-1")));
        assert!(ctx.hint("season").is_none());
    }
}
