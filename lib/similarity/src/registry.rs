//! Plugin registry
//!
//! Populated once at startup through [`PluginRegistryBuilder`], read-only
//! afterwards. Plugins for a category are kept sorted by descending
//! priority with registration order as the tie-break.

use crate::config::{BaseDefaults, ToleranceConfig, WeightConfig};
use crate::plugin::{CategoryPlugin, PluginContext};
use ahash::AHashMap;
use anchorx_core::{
    AttributeKey, AttributeMap, AttributeValue, Category, EntityFamily, Error, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

type PluginList = SmallVec<[Arc<dyn CategoryPlugin>; 4]>;

/// Which plugin's explicit override wins when several plugins override
/// the same attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePrecedence {
    /// Plugins are applied from lowest to highest priority, so the
    /// highest priority plugin writes last
    #[default]
    HighestPriorityWins,
    /// Plugins are applied from highest to lowest priority with last write
    /// winning. Kept for configurations tuned against that ordering.
    LowestPriorityWins,
}

#[derive(Debug, Default)]
pub struct PluginRegistryBuilder {
    plugins: Vec<Arc<dyn CategoryPlugin>>,
    base: BaseDefaults,
    precedence: OverridePrecedence,
}

impl PluginRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_defaults(mut self, base: BaseDefaults) -> Self {
        self.base = base;
        self
    }

    pub fn override_precedence(mut self, precedence: OverridePrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Add a plugin. Registration order breaks priority ties.
    pub fn register<P: CategoryPlugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn register_arc(mut self, plugin: Arc<dyn CategoryPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Freeze into an immutable registry
    pub fn build(self) -> Result<PluginRegistry> {
        self.base.validate().map_err(|e| Error::configuration("<base>", e))?;

        let mut buckets: AHashMap<Category, Vec<(usize, Arc<dyn CategoryPlugin>)>> =
            AHashMap::new();
        let mut global_entries = Vec::new();

        for (seq, plugin) in self.plugins.iter().enumerate() {
            let categories = plugin.categories();
            if categories.is_empty() {
                global_entries.push((seq, plugin.clone()));
            }
            for category in categories {
                buckets.entry(category.clone()).or_default().push((seq, plugin.clone()));
            }
        }

        let sorted = |mut entries: Vec<(usize, Arc<dyn CategoryPlugin>)>| -> PluginList {
            entries.sort_by_key(|(seq, p)| (std::cmp::Reverse(p.priority()), *seq));
            entries.into_iter().map(|(_, p)| p).collect()
        };

        let by_category: AHashMap<Category, PluginList> = buckets
            .into_iter()
            .map(|(category, mut entries)| {
                entries.extend(global_entries.iter().cloned());
                (category, sorted(entries))
            })
            .collect();
        let global = sorted(global_entries);

        debug!(
            plugins = self.plugins.len(),
            categories = by_category.len(),
            global = global.len(),
            precedence = ?self.precedence,
            "plugin registry built"
        );

        Ok(PluginRegistry { by_category, global, base: self.base, precedence: self.precedence })
    }
}

/// Immutable per-category plugin index
#[derive(Debug)]
pub struct PluginRegistry {
    by_category: AHashMap<Category, PluginList>,
    global: PluginList,
    base: BaseDefaults,
    precedence: OverridePrecedence,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self {
            by_category: AHashMap::new(),
            global: SmallVec::new(),
            base: BaseDefaults::standard(),
            precedence: OverridePrecedence::default(),
        }
    }
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::new()
    }

    pub fn base_defaults(&self) -> &BaseDefaults {
        &self.base
    }

    pub fn precedence(&self) -> OverridePrecedence {
        self.precedence
    }

    /// Applicable plugins in priority order (highest first)
    pub fn plugins_for(&self, category: &Category) -> &[Arc<dyn CategoryPlugin>] {
        self.by_category.get(category).unwrap_or(&self.global).as_slice()
    }

    pub fn plugin_names(&self, category: &Category) -> Vec<&str> {
        self.plugins_for(category).iter().map(|p| p.name()).collect()
    }

    /// Categories with at least one dedicated plugin, sorted
    pub fn categories(&self) -> Vec<&Category> {
        let mut categories: Vec<&Category> = self.by_category.keys().collect();
        categories.sort();
        categories
    }

    pub fn is_known(&self, category: &Category) -> bool {
        self.by_category.contains_key(category)
    }

    /// Plugins in the order their adjustments are applied
    fn application_order(
        &self,
        category: &Category,
    ) -> Box<dyn Iterator<Item = &Arc<dyn CategoryPlugin>> + '_> {
        let plugins = self.plugins_for(category);
        match self.precedence {
            OverridePrecedence::HighestPriorityWins => Box::new(plugins.iter().rev()),
            OverridePrecedence::LowestPriorityWins => Box::new(plugins.iter()),
        }
    }

    fn superseded(&self, category: &Category) -> HashSet<&str> {
        self.plugins_for(category)
            .iter()
            .flat_map(|p| p.superseded_attributes().iter().map(String::as_str))
            .collect()
    }

    /// Effective weights for `category` given the target item.
    ///
    /// Base defaults first; then for each plugin its increments (additive)
    /// followed by its overrides (replace). Raw attributes superseded by a
    /// derived score end at weight 0.
    pub fn resolve_weights(
        &self,
        category: &Category,
        target: &AttributeMap,
    ) -> Result<WeightConfig> {
        let mut weights = self.base.weights.clone();

        for plugin in self.application_order(category) {
            let adjustments = plugin.weight_adjustments(target);
            for (key, increment) in adjustments.increments {
                weights.add(key, increment);
            }
            for (key, weight) in adjustments.overrides {
                weights.set(key, weight);
            }
        }

        for name in self.superseded(category) {
            weights.set(AttributeKey::raw(name), 0.0);
        }

        weights.validate().map_err(|e| Error::configuration(category.as_str(), e))?;
        Ok(weights)
    }

    /// Effective tolerances for `category` given the target item
    pub fn resolve_tolerances(
        &self,
        category: &Category,
        target: &AttributeMap,
    ) -> Result<ToleranceConfig> {
        let mut tolerances = self.base.tolerances.clone();

        for plugin in self.application_order(category) {
            let adjustments = plugin.tolerance_adjustments(target);
            for (key, increment) in adjustments.increments {
                tolerances.widen(key, increment);
            }
            for (key, tolerance) in adjustments.overrides {
                tolerances.set(key, tolerance);
            }
        }

        tolerances.validate().map_err(|e| Error::configuration(category.as_str(), e))?;
        Ok(tolerances)
    }

    /// Derived attributes for an item. When two plugins produce the same
    /// name the higher priority one is kept.
    pub fn derived_features(
        &self,
        category: &Category,
        attrs: &AttributeMap,
        context: Option<&PluginContext>,
    ) -> Vec<(String, AttributeValue)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for plugin in self.plugins_for(category) {
            for feature in plugin.derived_features(attrs, context) {
                if seen.insert(feature.name.clone()) {
                    out.push((feature.name, feature.value));
                }
            }
        }
        out
    }

    /// Copy of `attrs` with the derived namespace filled in
    pub fn enrich(
        &self,
        category: &Category,
        attrs: &AttributeMap,
        context: Option<&PluginContext>,
    ) -> AttributeMap {
        attrs.with_derived(self.derived_features(category, attrs, context))
    }

    /// First non-`None` custom similarity in priority order
    pub fn custom_similarity(
        &self,
        category: &Category,
        key: &AttributeKey,
        target: Option<&AttributeValue>,
        candidate: Option<&AttributeValue>,
    ) -> Option<f64> {
        self.plugins_for(category)
            .iter()
            .find_map(|p| p.custom_similarity(key, target, candidate))
    }

    /// Entity family declared by the highest priority plugin that has one
    pub fn family(&self, category: &Category) -> EntityFamily {
        self.plugins_for(category)
            .iter()
            .find_map(|p| p.family())
            .unwrap_or_default()
    }

    /// Pre-filter hints from every applicable plugin; higher priority wins
    pub fn prefilter_extras(
        &self,
        category: &Category,
        attrs: &AttributeMap,
    ) -> BTreeMap<String, Value> {
        let mut extras = BTreeMap::new();
        for plugin in self.plugins_for(category).iter().rev() {
            extras.extend(plugin.prefilter_extras(attrs));
        }
        extras
    }

    /// First plugin-specific invalid-item classification
    pub fn invalid_reason(&self, category: &Category, attrs: &AttributeMap) -> Option<String> {
        self.plugins_for(category).iter().find_map(|p| p.invalid_reason(attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tolerance;
    use crate::declarative::{DeclarativePlugin, PluginSpec};

    fn spec(name: &str, priority: i32) -> PluginSpec {
        PluginSpec {
            name: name.to_string(),
            categories: vec![Category::new("weapon")],
            priority,
            ..Default::default()
        }
    }

    fn plugin(spec: PluginSpec) -> DeclarativePlugin {
        DeclarativePlugin::new(spec).unwrap()
    }

    fn weapon() -> Category {
        Category::new("weapon")
    }

    const GEM_RULE: &str =
        r#"{"kind":"lookup","name":"gem_score","source":"gem_level","table":[[0,0],[10,100]]}"#;

    fn gem_plugin(extra: &str) -> DeclarativePlugin {
        let json = format!(
            r#"{{"name": "gems", "categories": ["weapon"], {} "derived": [{}]}}"#,
            extra, GEM_RULE
        );
        DeclarativePlugin::from_json_str(&json).unwrap()
    }

    #[derive(Debug)]
    struct Custom {
        categories: Vec<Category>,
        priority: i32,
        answer: Option<f64>,
    }

    impl CategoryPlugin for Custom {
        fn name(&self) -> &str {
            "custom"
        }
        fn categories(&self) -> &[Category] {
            &self.categories
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn custom_similarity(
            &self,
            _: &AttributeKey,
            _: Option<&AttributeValue>,
            _: Option<&AttributeValue>,
        ) -> Option<f64> {
            self.answer
        }
    }

    #[test]
    fn test_priority_order_with_stable_ties() {
        let registry = PluginRegistry::builder()
            .register(plugin(spec("low", 1)))
            .register(plugin(spec("first-high", 5)))
            .register(plugin(spec("second-high", 5)))
            .build()
            .unwrap();

        assert_eq!(
            registry.plugin_names(&Category::new("weapon")),
            vec!["first-high", "second-high", "low"]
        );
    }

    #[test]
    fn test_global_plugins_apply_everywhere() {
        let global = PluginSpec { name: "global".to_string(), priority: 3, ..Default::default() };
        let registry = PluginRegistry::builder()
            .register(plugin(spec("weapons", 1)))
            .register(plugin(global))
            .build()
            .unwrap();

        assert_eq!(registry.plugin_names(&Category::new("weapon")), vec!["global", "weapons"]);
        assert_eq!(registry.plugin_names(&Category::new("unknown")), vec!["global"]);
        assert!(!registry.is_known(&Category::new("unknown")));
    }

    #[test]
    fn test_increments_then_overrides() {
        let mut s = spec("weapons", 1);
        s.weight_increments.insert(AttributeKey::raw("level"), 2.0);
        s.weight_overrides.insert(AttributeKey::raw("flaws"), 0.0);

        let registry = PluginRegistry::builder().register(plugin(s)).build().unwrap();
        let weights = registry.resolve_weights(&weapon(), &AttributeMap::new()).unwrap();

        // base level weight is 3
        assert_eq!(weights.weight(&AttributeKey::raw("level")), 5.0);
        assert_eq!(weights.weight(&AttributeKey::raw("flaws")), 0.0);
    }

    #[test]
    fn test_increments_are_cumulative() {
        let mut a = spec("a", 2);
        a.weight_increments.insert(AttributeKey::raw("level"), 1.0);
        let mut b = spec("b", 1);
        b.weight_increments.insert(AttributeKey::raw("level"), 1.0);

        let registry =
            PluginRegistry::builder().register(plugin(a)).register(plugin(b)).build().unwrap();
        let weights = registry.resolve_weights(&weapon(), &AttributeMap::new()).unwrap();
        assert_eq!(weights.weight(&AttributeKey::raw("level")), 5.0);
    }

    fn conflicting(precedence: OverridePrecedence) -> f64 {
        let mut high = spec("high", 10);
        high.weight_overrides.insert(AttributeKey::raw("level"), 7.0);
        let mut low = spec("low", 1);
        low.weight_overrides.insert(AttributeKey::raw("level"), 1.0);

        let registry = PluginRegistry::builder()
            .override_precedence(precedence)
            .register(plugin(low))
            .register(plugin(high))
            .build()
            .unwrap();
        registry
            .resolve_weights(&Category::new("weapon"), &AttributeMap::new())
            .unwrap()
            .weight(&AttributeKey::raw("level"))
    }

    #[test]
    fn test_override_precedence() {
        assert_eq!(conflicting(OverridePrecedence::HighestPriorityWins), 7.0);
        assert_eq!(conflicting(OverridePrecedence::LowestPriorityWins), 1.0);
    }

    #[test]
    fn test_superseded_raw_weight_is_zeroed() {
        let registry = PluginRegistry::builder()
            .register(gem_plugin(r#""weight_overrides": {"gem_level": 4.0},"#))
            .build()
            .unwrap();

        let weights = registry.resolve_weights(&weapon(), &AttributeMap::new()).unwrap();
        assert_eq!(weights.weight(&AttributeKey::raw("gem_level")), 0.0);
        assert_eq!(weights.weight(&AttributeKey::derived("gem_score")), 1.0);
    }

    #[test]
    fn test_negative_resolved_weight_is_configuration_error() {
        let mut s = spec("broken", 1);
        s.weight_increments.insert(AttributeKey::raw("level"), -10.0);
        let registry = PluginRegistry::builder().register(plugin(s)).build().unwrap();

        let result = registry.resolve_weights(&Category::new("weapon"), &AttributeMap::new());
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_tolerance_resolution() {
        let mut s = spec("weapons", 1);
        s.tolerance_increments.insert(AttributeKey::raw("level"), 0.05);
        s.tolerance_overrides.insert(AttributeKey::raw("school"), Tolerance::Exact);
        let registry = PluginRegistry::builder().register(plugin(s)).build().unwrap();

        let tolerances = registry.resolve_tolerances(&weapon(), &AttributeMap::new()).unwrap();
        match tolerances.get(&AttributeKey::raw("level")) {
            Some(Tolerance::Relative { tau }) => assert!((tau - 0.1).abs() < 1e-9),
            other => panic!("unexpected tolerance {:?}", other),
        }
        assert_eq!(tolerances.get(&AttributeKey::raw("school")), Some(&Tolerance::Exact));
    }

    #[test]
    fn test_custom_similarity_first_non_none() {
        let registry = PluginRegistry::builder()
            .register(Custom { categories: vec![weapon()], priority: 9, answer: None })
            .register(Custom { categories: vec![weapon()], priority: 5, answer: Some(0.25) })
            .register(Custom { categories: vec![weapon()], priority: 1, answer: Some(0.75) })
            .build()
            .unwrap();

        let key = AttributeKey::raw("anything");
        assert_eq!(registry.custom_similarity(&weapon(), &key, None, None), Some(0.25));
        assert_eq!(registry.custom_similarity(&Category::new("pet"), &key, None, None), None);
    }

    #[test]
    fn test_enrich_adds_derived_namespace() {
        let registry = PluginRegistry::builder().register(gem_plugin("")).build().unwrap();

        let attrs = AttributeMap::new().with("gem_level", 5.0);
        let enriched = registry.enrich(&Category::new("weapon"), &attrs, None);
        assert_eq!(enriched.derived("gem_score"), Some(&AttributeValue::Number(50.0)));
        assert_eq!(enriched.raw("gem_level"), Some(&AttributeValue::Number(5.0)));
    }

    #[test]
    fn test_family_defaults_to_other() {
        let registry = PluginRegistry::default();
        assert_eq!(registry.family(&Category::new("weapon")), EntityFamily::Other);
    }
}
