//! Pre-filter builder
//!
//! Derives a cheap, coarse [`FilterSpec`] from the target item so the
//! collector can shrink the candidate set before scoring.

use anchorx_core::{
    AttributeMap, AttributeValue, Category, EntityFamily, FilterCondition, FilterSpec,
};
use anchorx_similarity::PluginRegistry;
use serde::{Deserialize, Serialize};

/// Level band for one entity family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LevelBand {
    /// Candidate level must equal the target level
    Exact,
    /// target - below ..= target + above
    Window { below: f64, above: f64 },
    /// No level condition
    Unbounded,
}

impl LevelBand {
    pub fn symmetric(width: f64) -> Self {
        LevelBand::Window { below: width, above: width }
    }

    /// Range condition around `level`, `None` when unbounded
    pub fn range(&self, key: &str, level: f64) -> Option<FilterCondition> {
        match *self {
            LevelBand::Exact => Some(FilterCondition::Range {
                key: key.to_string(),
                min: level,
                max: level,
            }),
            LevelBand::Window { below, above } => Some(FilterCondition::Range {
                key: key.to_string(),
                min: level - below,
                max: level + above,
            }),
            LevelBand::Unbounded => None,
        }
    }
}

/// Level band per entity family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyBands {
    pub equipment: LevelBand,
    pub pet: LevelBand,
    pub character: LevelBand,
    pub other: LevelBand,
}

impl Default for FamilyBands {
    fn default() -> Self {
        Self {
            equipment: LevelBand::symmetric(10.0),
            pet: LevelBand::symmetric(5.0),
            character: LevelBand::Exact,
            other: LevelBand::Unbounded,
        }
    }
}

impl FamilyBands {
    pub fn band(&self, family: EntityFamily) -> LevelBand {
        match family {
            EntityFamily::Equipment => self.equipment,
            EntityFamily::Pet => self.pet,
            EntityFamily::Character => self.character,
            EntityFamily::Other => self.other,
        }
    }
}

fn default_level_key() -> String {
    "level".to_string()
}

fn default_equality_keys() -> Vec<String> {
    vec!["special_skill".to_string()]
}

fn default_membership_keys() -> Vec<String> {
    vec!["special_effects".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreFilterConfig {
    #[serde(default = "default_level_key")]
    pub level_key: String,

    #[serde(default)]
    pub bands: FamilyBands,

    /// Discrete attributes that must match exactly when the target has a
    /// non-zero value
    #[serde(default = "default_equality_keys")]
    pub equality_keys: Vec<String>,

    /// List attributes whose ids must all be present on the candidate
    /// when the target's list is non-empty
    #[serde(default = "default_membership_keys")]
    pub membership_keys: Vec<String>,

    /// Ask plugins for category specific extras
    #[serde(default = "default_true")]
    pub plugin_extras: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PreFilterConfig {
    fn default() -> Self {
        Self {
            level_key: default_level_key(),
            bands: FamilyBands::default(),
            equality_keys: default_equality_keys(),
            membership_keys: default_membership_keys(),
            plugin_extras: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreFilterBuilder {
    config: PreFilterConfig,
}

impl PreFilterBuilder {
    pub fn new(config: PreFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreFilterConfig {
        &self.config
    }

    /// Build the filter for `target` in `category`
    pub fn build(
        &self,
        registry: &PluginRegistry,
        category: &Category,
        target: &AttributeMap,
    ) -> FilterSpec {
        let mut spec = FilterSpec::new(category.clone());

        if let Some(level) = target.raw(&self.config.level_key).and_then(AttributeValue::as_f64) {
            let band = self.config.bands.band(registry.family(category));
            if let Some(condition) = band.range(&self.config.level_key, level) {
                spec.conditions.push(condition);
            }
        }

        for key in &self.config.equality_keys {
            if let Some(value) = target.raw(key).filter(|v| !v.is_default()) {
                spec.conditions.push(FilterCondition::Equals {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }

        for key in &self.config.membership_keys {
            let ids = target.raw(key).map(AttributeValue::numeric_items).unwrap_or_default();
            if !ids.is_empty() {
                spec.conditions
                    .push(FilterCondition::ContainsAll { key: key.clone(), values: ids });
            }
        }

        if self.config.plugin_extras {
            spec.extras = registry.prefilter_extras(category, target);
        }

        spec
    }
}
