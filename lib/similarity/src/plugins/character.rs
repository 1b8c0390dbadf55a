//! Character plugin
//!
//! Whole characters only compare at the same level and school. The four
//! cultivation tracks are folded into one derived score.

use crate::config::{Tolerance, ToleranceAdjustments, WeightAdjustments};
use crate::derived::{DerivedRule, SourceMode};
use crate::plugin::{CategoryPlugin, DerivedFeature, PluginContext};
use anchorx_core::{AttributeKey, AttributeMap, Category, EntityFamily};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const CULTIVATION: &str = "cultivation";
pub const SCHOOL: &str = "school";

#[derive(Debug, Clone)]
pub struct CharacterPlugin {
    categories: Vec<Category>,
    cultivation_rule: DerivedRule,
    superseded: Vec<String>,
}

impl Default for CharacterPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl CharacterPlugin {
    pub fn new() -> Self {
        let cultivation_rule = DerivedRule::lookup_with_mode(
            "cultivation_score",
            CULTIVATION,
            SourceMode::Sum,
            vec![[0.0, 0.0], [40.0, 50.0], [80.0, 85.0], [100.0, 100.0]],
        );
        Self {
            categories: vec![Category::new("character")],
            cultivation_rule,
            superseded: vec![CULTIVATION.to_string()],
        }
    }
}

impl CategoryPlugin for CharacterPlugin {
    fn name(&self) -> &str {
        "character"
    }

    fn categories(&self) -> &[Category] {
        &self.categories
    }

    fn priority(&self) -> i32 {
        10
    }

    fn family(&self) -> Option<EntityFamily> {
        Some(EntityFamily::Character)
    }

    fn superseded_attributes(&self) -> &[String] {
        &self.superseded
    }

    fn derived_features(
        &self,
        attrs: &AttributeMap,
        _context: Option<&PluginContext>,
    ) -> Vec<DerivedFeature> {
        let rule = &self.cultivation_rule;
        vec![DerivedFeature::new(rule.name(), rule.evaluate(attrs))]
    }

    fn weight_adjustments(&self, _target: &AttributeMap) -> WeightAdjustments {
        let mut adjustments = WeightAdjustments::default();
        adjustments.overrides.insert(AttributeKey::raw("level"), 4.0);
        adjustments.overrides.insert(AttributeKey::raw(SCHOOL), 2.0);
        adjustments.overrides.insert(AttributeKey::derived("cultivation_score"), 4.0);
        adjustments.overrides.insert(AttributeKey::raw("equipment_score"), 2.0);
        adjustments
    }

    fn tolerance_adjustments(&self, _target: &AttributeMap) -> ToleranceAdjustments {
        let mut adjustments = ToleranceAdjustments::default();
        adjustments.overrides.insert(AttributeKey::raw("level"), Tolerance::Exact);
        adjustments.overrides.insert(AttributeKey::raw(SCHOOL), Tolerance::Exact);
        adjustments
            .overrides
            .insert(AttributeKey::derived("cultivation_score"), Tolerance::relative(0.1));
        adjustments
            .overrides
            .insert(AttributeKey::raw("equipment_score"), Tolerance::relative(0.15));
        adjustments
    }

    fn prefilter_extras(&self, attrs: &AttributeMap) -> BTreeMap<String, Value> {
        let mut extras = BTreeMap::new();
        let school = attrs.raw(SCHOOL).and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty());
        if let Some(school) = school {
            extras.insert(SCHOOL.to_string(), json!(school.to_lowercase()));
        }
        extras
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorx_core::AttributeValue;

    #[test]
    fn test_cultivation_sum_score() {
        let plugin = CharacterPlugin::new();
        let attrs = AttributeMap::new().with(CULTIVATION, vec![10.0, 10.0, 10.0, 10.0]);
        let features = plugin.derived_features(&attrs, None);
        assert_eq!(features[0].value, AttributeValue::Number(50.0));
    }

    #[test]
    fn test_level_is_exact() {
        let tolerances = CharacterPlugin::new().tolerance_adjustments(&AttributeMap::new());
        assert_eq!(tolerances.overrides.get(&AttributeKey::raw("level")), Some(&Tolerance::Exact));
    }

    #[test]
    fn test_school_extra() {
        let plugin = CharacterPlugin::new();
        let extras = plugin.prefilter_extras(&AttributeMap::new().with(SCHOOL, "Dragon Palace"));
        assert_eq!(extras.get(SCHOOL), Some(&json!("dragon palace")));
        assert!(plugin.prefilter_extras(&AttributeMap::new()).is_empty());
    }
}
