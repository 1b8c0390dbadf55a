use crate::attribute::{AttributeKey, AttributeMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Item type classification, the primary plugin dispatch key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Category(String);

impl Category {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Category::new(s)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::new(s)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.0
    }
}

/// Coarse grouping of categories that share pre-filter behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityFamily {
    /// Weapons, armor and accessories
    Equipment,
    /// Summoned companions
    Pet,
    /// Whole player accounts / characters
    Character,
    #[default]
    Other,
}

/// A market listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub attributes: AttributeMap,
    pub price: f64,
}

impl Candidate {
    pub fn new(id: impl Into<String>, attributes: AttributeMap, price: f64) -> Self {
        Self { id: id.into(), attributes, price }
    }
}

/// A candidate selected as comparable to the target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anchor {
    pub candidate: Candidate,
    /// Overall weighted similarity in [0, 1]
    pub similarity: f64,
    /// Per-attribute contributions to `similarity` (weight share times similarity)
    pub contributions: BTreeMap<AttributeKey, f64>,
}

impl Anchor {
    pub fn new(candidate: Candidate, similarity: f64) -> Self {
        Self { candidate, similarity, contributions: BTreeMap::new() }
    }

    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    pub fn price(&self) -> f64 {
        self.candidate.price
    }

    /// Attribute that contributed most to the similarity
    pub fn top_contributor(&self) -> Option<&AttributeKey> {
        self.contributions
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(key, _)| key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_normalizes_case() {
        assert_eq!(Category::new("Weapon"), Category::from("weapon"));
        assert_eq!(Category::new("PET").as_str(), "pet");
        let parsed: Category = serde_json::from_str("\"Armor\"").unwrap();
        assert_eq!(parsed, Category::new("armor"));
    }

    #[test]
    fn test_anchor_top_contributor() {
        let mut anchor = Anchor::new(Candidate::new("l1", AttributeMap::new(), 10.0), 0.9);
        anchor.contributions.insert(AttributeKey::raw("level"), 0.2);
        anchor.contributions.insert(AttributeKey::derived("gem_score"), 0.7);

        assert_eq!(anchor.top_contributor(), Some(&AttributeKey::derived("gem_score")));
        assert_eq!(anchor.price(), 10.0);
        assert_eq!(anchor.id(), "l1");
    }

    #[test]
    fn test_family_serde() {
        let family: EntityFamily = serde_json::from_str("\"equipment\"").unwrap();
        assert_eq!(family, EntityFamily::Equipment);
        assert_eq!(EntityFamily::default(), EntityFamily::Other);
    }
}
