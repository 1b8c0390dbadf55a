//! Equipment plugin
//!
//! Weapons, armor and accessories. Gem level and the primary stat are
//! normalized into 0-100 scores, special effects compare by overlap, and
//! the dominant main attribute groups listings for the pre-filter.

use crate::config::{Tolerance, ToleranceAdjustments, WeightAdjustments};
use crate::derived::DerivedRule;
use crate::distance::overlap_similarity;
use crate::plugin::{CategoryPlugin, DerivedFeature, PluginContext};
use anchorx_core::{AttributeKey, AttributeMap, AttributeValue, Category, EntityFamily};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const EQUIPMENT_CATEGORIES: &[&str] =
    &["weapon", "armor", "helmet", "necklace", "belt", "boots"];

/// Stats that decide which build an item suits
pub const MAIN_ATTRIBUTES: &[&str] = &["strength", "magic", "agility", "endurance", "intellect"];

pub const SPECIAL_EFFECTS: &str = "special_effects";
pub const SPECIAL_SKILL: &str = "special_skill";

#[derive(Debug, Clone)]
pub struct EquipmentPlugin {
    categories: Vec<Category>,
    rules: Vec<DerivedRule>,
    superseded: Vec<String>,
}

impl Default for EquipmentPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EquipmentPlugin {
    pub fn new() -> Self {
        Self::with_categories(EQUIPMENT_CATEGORIES.iter().map(|c| Category::new(*c)).collect())
    }

    pub fn with_categories(categories: Vec<Category>) -> Self {
        let rules = vec![
            DerivedRule::lookup(
                "gem_score",
                "gem_level",
                vec![[0.0, 0.0], [5.0, 40.0], [10.0, 80.0], [13.0, 100.0]],
            ),
            DerivedRule::level_ratio(
                "damage_score",
                "damage",
                vec![[60.0, 300.0], [100.0, 500.0], [160.0, 800.0]],
            ),
            DerivedRule::level_ratio(
                "defense_score",
                "defense",
                vec![[60.0, 150.0], [100.0, 260.0], [160.0, 420.0]],
            ),
        ];
        let superseded = rules.iter().filter_map(|r| r.superseded().map(str::to_string)).collect();
        Self { categories, rules, superseded }
    }

    /// Main attribute with the highest value, if any is set
    pub fn attribute_class(attrs: &AttributeMap) -> Option<&'static str> {
        MAIN_ATTRIBUTES
            .iter()
            .map(|name| (*name, attrs.number(name)))
            .filter(|(_, v)| *v > 0.0)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name)
    }
}

impl CategoryPlugin for EquipmentPlugin {
    fn name(&self) -> &str {
        "equipment"
    }

    fn categories(&self) -> &[Category] {
        &self.categories
    }

    fn priority(&self) -> i32 {
        10
    }

    fn family(&self) -> Option<EntityFamily> {
        Some(EntityFamily::Equipment)
    }

    fn superseded_attributes(&self) -> &[String] {
        &self.superseded
    }

    fn derived_features(
        &self,
        attrs: &AttributeMap,
        _context: Option<&PluginContext>,
    ) -> Vec<DerivedFeature> {
        self.rules
            .iter()
            .map(|rule| DerivedFeature::new(rule.name(), rule.evaluate(attrs)))
            .collect()
    }

    fn weight_adjustments(&self, target: &AttributeMap) -> WeightAdjustments {
        let mut adjustments = WeightAdjustments::default();
        adjustments.increments.insert(AttributeKey::raw(SPECIAL_EFFECTS), 1.0);
        if target.number(SPECIAL_SKILL) != 0.0 {
            adjustments.increments.insert(AttributeKey::raw(SPECIAL_SKILL), 2.0);
        }
        adjustments.overrides.insert(AttributeKey::derived("gem_score"), 2.0);
        adjustments.overrides.insert(AttributeKey::derived("damage_score"), 3.0);
        adjustments.overrides.insert(AttributeKey::derived("defense_score"), 3.0);
        for name in MAIN_ATTRIBUTES {
            adjustments.overrides.insert(AttributeKey::raw(*name), 1.5);
        }
        adjustments
    }

    fn tolerance_adjustments(&self, _target: &AttributeMap) -> ToleranceAdjustments {
        let mut adjustments = ToleranceAdjustments::default();
        adjustments.overrides.insert(AttributeKey::derived("gem_score"), Tolerance::relative(0.15));
        adjustments
            .overrides
            .insert(AttributeKey::derived("damage_score"), Tolerance::relative(0.08));
        adjustments
            .overrides
            .insert(AttributeKey::derived("defense_score"), Tolerance::relative(0.08));
        for name in MAIN_ATTRIBUTES {
            adjustments.overrides.insert(AttributeKey::raw(*name), Tolerance::relative(0.1));
        }
        adjustments
    }

    fn custom_similarity(
        &self,
        key: &AttributeKey,
        target: Option<&AttributeValue>,
        candidate: Option<&AttributeValue>,
    ) -> Option<f64> {
        if key.is_derived() || key.name != SPECIAL_EFFECTS {
            return None;
        }
        let empty = |v: Option<&AttributeValue>| v.map(AttributeValue::is_default).unwrap_or(true);
        if empty(target) && empty(candidate) {
            return None;
        }
        let none = AttributeValue::List(Vec::new());
        Some(overlap_similarity(target.unwrap_or(&none), candidate.unwrap_or(&none)))
    }

    fn prefilter_extras(&self, attrs: &AttributeMap) -> BTreeMap<String, Value> {
        let mut extras = BTreeMap::new();
        if let Some(class) = Self::attribute_class(attrs) {
            extras.insert("attribute_class".to_string(), json!(class));
        }
        extras
    }

    fn invalid_reason(&self, attrs: &AttributeMap) -> Option<String> {
        match attrs.raw("durability").and_then(AttributeValue::as_f64) {
            Some(d) if d <= 0.0 => Some("equipment is broken (durability 0)".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sword() -> AttributeMap {
        AttributeMap::new()
            .with("level", 80.0)
            .with("gem_level", 5.0)
            .with("damage", 400.0)
            .with("strength", 30.0)
            .with("agility", 12.0)
            .with(SPECIAL_EFFECTS, vec![3.0, 7.0])
    }

    #[test]
    fn test_derived_scores() {
        let plugin = EquipmentPlugin::new();
        let features = plugin.derived_features(&sword(), None);

        let get = |name: &str| features.iter().find(|f| f.name == name).map(|f| f.value.clone());
        assert_eq!(get("gem_score"), Some(AttributeValue::Number(40.0)));
        // expected damage at level 80 is 400
        assert_eq!(get("damage_score"), Some(AttributeValue::Number(100.0)));
        assert_eq!(get("defense_score"), Some(AttributeValue::Number(0.0)));
    }

    #[test]
    fn test_superseded_raw_attributes() {
        let plugin = EquipmentPlugin::new();
        let superseded = plugin.superseded_attributes();
        assert!(superseded.contains(&"gem_level".to_string()));
        assert!(superseded.contains(&"damage".to_string()));
    }

    #[test]
    fn test_special_skill_increment_depends_on_target() {
        let plugin = EquipmentPlugin::new();
        let plain = plugin.weight_adjustments(&sword());
        let skilled = plugin.weight_adjustments(&sword().with(SPECIAL_SKILL, 21.0));

        assert!(!plain.increments.contains_key(&AttributeKey::raw(SPECIAL_SKILL)));
        assert_eq!(skilled.increments.get(&AttributeKey::raw(SPECIAL_SKILL)), Some(&2.0));
    }

    #[test]
    fn test_special_effect_overlap() {
        let plugin = EquipmentPlugin::new();
        let key = AttributeKey::raw(SPECIAL_EFFECTS);
        let a = AttributeValue::from(vec![3.0, 7.0]);
        let b = AttributeValue::from(vec![7.0]);

        assert_eq!(plugin.custom_similarity(&key, Some(&a), Some(&b)), Some(0.5));
        assert_eq!(plugin.custom_similarity(&key, Some(&a), None), Some(0.0));
        assert_eq!(plugin.custom_similarity(&key, None, None), None);
        assert_eq!(plugin.custom_similarity(&AttributeKey::raw("level"), Some(&a), Some(&b)), None);
    }

    #[test]
    fn test_prefilter_extras() {
        let extras = EquipmentPlugin::new().prefilter_extras(&sword());
        assert_eq!(extras.get("attribute_class"), Some(&json!("strength")));
        // secondary stats never become hard filters
        assert_eq!(extras.len(), 1);
        assert!(EquipmentPlugin::new().prefilter_extras(&AttributeMap::new()).is_empty());
    }

    #[test]
    fn test_broken_equipment_is_invalid() {
        let plugin = EquipmentPlugin::new();
        assert!(plugin.invalid_reason(&sword()).is_none());
        assert!(plugin.invalid_reason(&sword().with("durability", 0.0)).is_some());
        assert!(plugin.invalid_reason(&sword().with("durability", 120.0)).is_none());
    }
}
