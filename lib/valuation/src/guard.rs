//! Invalid item guard
//!
//! Classifies obviously valueless items from their attributes alone so
//! the engine can skip candidate retrieval for them.

use anchorx_core::{AttributeMap, AttributeValue, Category};
use anchorx_similarity::PluginRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub enabled: bool,
    pub level_key: String,
    /// Minimum level for categories without their own entry
    pub default_min_level: f64,
    /// Per-category minimum level
    pub min_levels: BTreeMap<Category, f64>,
    pub defect_key: String,
    /// Defect count at which an otherwise plain item is worthless
    pub heavy_defect_threshold: f64,
    /// Attributes that give an item its value. Empty means every raw
    /// non-metadata attribute except the defect count.
    pub discriminating_keys: Vec<String>,
    /// Price reported for invalid items
    pub salvage_value: f64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level_key: "level".to_string(),
            default_min_level: 1.0,
            min_levels: BTreeMap::new(),
            defect_key: "flaws".to_string(),
            heavy_defect_threshold: 3.0,
            discriminating_keys: Vec::new(),
            salvage_value: 0.0,
        }
    }
}

impl GuardConfig {
    pub fn with_min_level(mut self, category: impl Into<Category>, level: f64) -> Self {
        self.min_levels.insert(category.into(), level);
        self
    }

    pub fn min_level(&self, category: &Category) -> f64 {
        self.min_levels.get(category).copied().unwrap_or(self.default_min_level)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvalidItemGuard {
    config: GuardConfig,
}

impl InvalidItemGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn salvage_value(&self) -> f64 {
        self.config.salvage_value
    }

    /// Reason the item is not worth valuing, `None` when it should go
    /// through the pipeline
    pub fn check(
        &self,
        registry: &PluginRegistry,
        category: &Category,
        attrs: &AttributeMap,
    ) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        if attrs.is_empty() {
            return Some("item has no attributes".to_string());
        }

        if let Some(level) = attrs.raw(&self.config.level_key).and_then(AttributeValue::as_f64) {
            let min = self.config.min_level(category);
            if level < min {
                return Some(format!(
                    "level {} is below the minimum {} for {}",
                    level, min, category
                ));
            }
        }

        let keys = self.discriminating_keys(attrs);
        let plain = |skip_level: bool| {
            keys.iter()
                .filter(|k| !(skip_level && **k == self.config.level_key))
                .all(|k| attrs.raw(k).map(AttributeValue::is_default).unwrap_or(true))
        };

        let defects = attrs.number(&self.config.defect_key);
        if defects >= self.config.heavy_defect_threshold && plain(true) {
            return Some(format!("{} defects with no redeeming attributes", defects));
        }

        if plain(false) {
            return Some("every discriminating attribute is at its default value".to_string());
        }

        registry.invalid_reason(category, attrs)
    }

    fn discriminating_keys(&self, attrs: &AttributeMap) -> Vec<String> {
        if !self.config.discriminating_keys.is_empty() {
            return self.config.discriminating_keys.clone();
        }
        attrs
            .raw_entries()
            .map(|(name, _)| name)
            .filter(|name| *name != &self.config.defect_key)
            .filter(|name| !anchorx_core::METADATA_KEYS.contains(&name.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorx_similarity::plugins::register_builtin_plugins;

    fn registry() -> PluginRegistry {
        register_builtin_plugins(PluginRegistry::builder()).build().unwrap()
    }

    fn weapon() -> Category {
        Category::new("weapon")
    }

    #[test]
    fn test_normal_item_passes() {
        let guard = InvalidItemGuard::default();
        let attrs = AttributeMap::new().with("level", 80.0).with("damage", 420.0);
        assert_eq!(guard.check(&registry(), &weapon(), &attrs), None);
    }

    #[test]
    fn test_level_zero_is_invalid() {
        let guard = InvalidItemGuard::default();
        let attrs = AttributeMap::new().with("level", 0.0).with("damage", 420.0);
        let reason = guard.check(&registry(), &weapon(), &attrs).unwrap();
        assert!(reason.contains("below the minimum"));
    }

    #[test]
    fn test_category_minimum() {
        let guard = InvalidItemGuard::new(GuardConfig::default().with_min_level("Character", 60.0));
        let attrs = AttributeMap::new().with("level", 50.0).with("school", "dragon palace");
        assert!(guard.check(&registry(), &Category::new("character"), &attrs).is_some());
        assert!(guard.check(&registry(), &weapon(), &attrs).is_none());
    }

    #[test]
    fn test_heavy_defects_with_plain_attributes() {
        let guard = InvalidItemGuard::default();
        let attrs = AttributeMap::new().with("level", 80.0).with("flaws", 4.0).with("damage", 0.0);
        let reason = guard.check(&registry(), &weapon(), &attrs).unwrap();
        assert!(reason.contains("defects"));

        let redeemed = attrs.clone().with("special_skill", 21.0);
        assert!(guard.check(&registry(), &weapon(), &redeemed).is_none());
    }

    #[test]
    fn test_all_default_attributes() {
        let guard = InvalidItemGuard::default();
        let attrs =
            AttributeMap::new().with("damage", 0.0).with("special_effects", Vec::<f64>::new());
        assert!(guard.check(&registry(), &weapon(), &attrs).is_some());
        assert!(guard.check(&registry(), &weapon(), &AttributeMap::new()).is_some());
    }

    #[test]
    fn test_plugin_rule_consulted_last() {
        let guard = InvalidItemGuard::default();
        let broken =
            AttributeMap::new().with("level", 80.0).with("damage", 400.0).with("durability", 0.0);
        let reason = guard.check(&registry(), &weapon(), &broken).unwrap();
        assert!(reason.contains("broken"));
    }

    #[test]
    fn test_disabled_guard() {
        let guard = InvalidItemGuard::new(GuardConfig { enabled: false, ..Default::default() });
        assert!(guard.check(&registry(), &weapon(), &AttributeMap::new()).is_none());
    }

    #[test]
    fn test_config_from_json() {
        let config: GuardConfig = serde_json::from_str(
            r#"{"min_levels": {"Pet": 5}, "salvage_value": 1.5,
                "discriminating_keys": ["damage"]}"#,
        )
        .unwrap();
        assert_eq!(config.min_level(&Category::new("pet")), 5.0);
        assert_eq!(config.min_level(&weapon()), 1.0);
        assert_eq!(config.salvage_value, 1.5);
        assert_eq!(config.level_key, "level");
    }
}
