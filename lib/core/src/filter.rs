// Coarse candidate filter derived from the target item.
//
// Narrowing is best effort: collectors may ignore conditions they cannot
// evaluate, and must ignore extras they do not recognize.

use crate::attribute::{AttributeMap, AttributeValue};
use crate::candidate::Category;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterCondition {
    /// Inclusive numeric band; a missing attribute reads as 0
    Range { key: String, min: f64, max: f64 },
    /// Attribute must equal the value
    Equals { key: String, value: AttributeValue },
    /// Attribute (a list) must contain every id
    ContainsAll { key: String, values: Vec<f64> },
}

impl FilterCondition {
    pub fn key(&self) -> &str {
        match self {
            FilterCondition::Range { key, .. }
            | FilterCondition::Equals { key, .. }
            | FilterCondition::ContainsAll { key, .. } => key,
        }
    }

    fn matches(&self, attrs: &AttributeMap) -> bool {
        match self {
            FilterCondition::Range { key, min, max } => {
                let v = attrs.number(key);
                v >= *min && v <= *max
            }
            FilterCondition::Equals { key, value } => {
                attrs.raw(key).map(|v| v.same_as(value)).unwrap_or(false)
            }
            FilterCondition::ContainsAll { key, values } => {
                let have = attrs.raw(key).map(AttributeValue::numeric_items).unwrap_or_default();
                values
                    .iter()
                    .all(|wanted| have.iter().any(|h| (h - wanted).abs() < f64::EPSILON))
            }
        }
    }
}

/// Filter specification handed to a market data collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Mandatory exact category match
    pub category: Category,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    /// Category specific narrowing hints (coarse groupings).
    /// Consumers ignore the ones they do not know.
    #[serde(default)]
    pub extras: BTreeMap<String, Value>,
}

impl FilterSpec {
    pub fn new(category: Category) -> Self {
        Self { category, conditions: Vec::new(), extras: BTreeMap::new() }
    }

    pub fn with_condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extras.insert(name.into(), value);
        self
    }

    pub fn condition(&self, key: &str) -> Option<&FilterCondition> {
        self.conditions.iter().find(|c| c.key() == key)
    }

    /// Category plus every condition
    pub fn matches(&self, category: &Category, attrs: &AttributeMap) -> bool {
        &self.category == category && self.conditions.iter().all(|c| c.matches(attrs))
    }

    /// Extras check against a listing's precomputed tags. Only extras
    /// present on both sides are compared.
    pub fn extras_compatible(&self, tags: &BTreeMap<String, Value>) -> bool {
        self.extras
            .iter()
            .all(|(name, wanted)| tags.get(name).map(|have| have == wanted).unwrap_or(true))
    }
}
