//! Pet plugin
//!
//! Skill sets compare by overlap and count; growth compares by tier.

use crate::config::{Tolerance, ToleranceAdjustments, WeightAdjustments};
use crate::derived::{DerivedRule, SourceMode};
use crate::distance::overlap_similarity;
use crate::plugin::{CategoryPlugin, DerivedFeature, PluginContext};
use anchorx_core::{AttributeKey, AttributeMap, AttributeValue, Category, EntityFamily};

pub const SKILLS: &str = "skills";

/// Growth tier boundaries
pub const GROWTH_TIERS: &[f64] = &[1.0, 1.1, 1.2, 1.25, 1.3];

#[derive(Debug, Clone)]
pub struct PetPlugin {
    categories: Vec<Category>,
    skill_rule: DerivedRule,
}

impl Default for PetPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PetPlugin {
    pub fn new() -> Self {
        Self {
            categories: vec![Category::new("pet")],
            // the raw skill list keeps its own weight for overlap scoring
            skill_rule: DerivedRule::Lookup {
                name: "skill_score".to_string(),
                source: SKILLS.to_string(),
                mode: SourceMode::Count,
                table: vec![[0.0, 0.0], [4.0, 30.0], [8.0, 70.0], [12.0, 100.0]],
                supersede: false,
            },
        }
    }
}

impl CategoryPlugin for PetPlugin {
    fn name(&self) -> &str {
        "pet"
    }

    fn categories(&self) -> &[Category] {
        &self.categories
    }

    fn priority(&self) -> i32 {
        10
    }

    fn family(&self) -> Option<EntityFamily> {
        Some(EntityFamily::Pet)
    }

    fn derived_features(
        &self,
        attrs: &AttributeMap,
        _context: Option<&PluginContext>,
    ) -> Vec<DerivedFeature> {
        vec![DerivedFeature::new(self.skill_rule.name(), self.skill_rule.evaluate(attrs))]
    }

    fn weight_adjustments(&self, target: &AttributeMap) -> WeightAdjustments {
        let mut adjustments = WeightAdjustments::default();
        adjustments.overrides.insert(AttributeKey::raw(SKILLS), 4.0);
        adjustments.overrides.insert(AttributeKey::derived("skill_score"), 2.0);
        adjustments.overrides.insert(AttributeKey::raw("growth"), 3.0);
        adjustments.overrides.insert(AttributeKey::raw("aptitude"), 2.0);
        if target.number("special_skill") != 0.0 {
            adjustments.increments.insert(AttributeKey::raw("special_skill"), 1.0);
        }
        adjustments
    }

    fn tolerance_adjustments(&self, _target: &AttributeMap) -> ToleranceAdjustments {
        let mut adjustments = ToleranceAdjustments::default();
        adjustments.overrides.insert(
            AttributeKey::raw("growth"),
            Tolerance::Tiered { bounds: GROWTH_TIERS.to_vec(), step_penalty: 0.35 },
        );
        adjustments.overrides.insert(AttributeKey::raw("aptitude"), Tolerance::relative(0.05));
        adjustments
            .overrides
            .insert(AttributeKey::derived("skill_score"), Tolerance::relative(0.15));
        // pet levels matter less than equipment levels
        adjustments.increments.insert(AttributeKey::raw("level"), 0.05);
        adjustments
    }

    fn custom_similarity(
        &self,
        key: &AttributeKey,
        target: Option<&AttributeValue>,
        candidate: Option<&AttributeValue>,
    ) -> Option<f64> {
        if key.is_derived() || key.name != SKILLS {
            return None;
        }
        let none = AttributeValue::List(Vec::new());
        let (a, b) = (target.unwrap_or(&none), candidate.unwrap_or(&none));
        if a.is_default() && b.is_default() {
            return None;
        }
        Some(overlap_similarity(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_score_from_count() {
        let plugin = PetPlugin::new();
        let attrs = AttributeMap::new().with(SKILLS, vec!["bite", "stealth", "counter", "fly"]);
        let features = plugin.derived_features(&attrs, None);
        assert_eq!(features, vec![DerivedFeature::new("skill_score", 30.0)]);
        assert!(plugin.superseded_attributes().is_empty());
    }

    #[test]
    fn test_skill_overlap_is_order_insensitive() {
        let plugin = PetPlugin::new();
        let key = AttributeKey::raw(SKILLS);
        let a = AttributeValue::from(vec!["bite", "stealth"]);
        let b = AttributeValue::from(vec!["stealth", "bite"]);
        let c = AttributeValue::from(vec!["stealth", "fly"]);

        assert_eq!(plugin.custom_similarity(&key, Some(&a), Some(&b)), Some(1.0));
        let partial = plugin.custom_similarity(&key, Some(&a), Some(&c)).unwrap();
        assert!((partial - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_is_tiered() {
        let plugin = PetPlugin::new();
        let tolerances = plugin.tolerance_adjustments(&AttributeMap::new());
        assert!(matches!(
            tolerances.overrides.get(&AttributeKey::raw("growth")),
            Some(Tolerance::Tiered { .. })
        ));
    }
}
