//! Attribute maps
//!
//! The canonical per-item feature vector. Raw attributes come from the
//! upstream feature extractor; derived attributes are computed by category
//! plugins and live in their own namespace so that a normalized score never
//! silently double-counts the raw value it was computed from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute names that describe a listing rather than the item itself.
/// These never take part in similarity scoring.
pub const METADATA_KEYS: &[&str] = &["id", "price", "timestamp", "listed_at", "seller"];

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Numeric value (levels, stats, ids)
    Number(f64),
    /// Free text or an enumerated label
    Text(String),
    /// Ordered list (skills, special effects)
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for the neutral value: 0, empty text or empty list
    pub fn is_default(&self) -> bool {
        match self {
            AttributeValue::Number(n) => *n == 0.0,
            AttributeValue::Text(s) => s.trim().is_empty(),
            AttributeValue::List(items) => items.is_empty(),
        }
    }

    /// Checks that every number inside the value is finite
    pub fn is_finite(&self) -> bool {
        match self {
            AttributeValue::Number(n) => n.is_finite(),
            AttributeValue::Text(_) => true,
            AttributeValue::List(items) => items.iter().all(AttributeValue::is_finite),
        }
    }

    /// Structural equality with an epsilon for numbers and
    /// case-insensitive comparison for text
    pub fn same_as(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Number(a), AttributeValue::Number(b)) => (a - b).abs() < f64::EPSILON,
            (AttributeValue::Text(a), AttributeValue::Text(b)) => a.eq_ignore_ascii_case(b),
            (AttributeValue::List(a), AttributeValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_as(y))
            }
            _ => false,
        }
    }

    /// Numeric ids contained in a list value (non-numeric entries are skipped)
    pub fn numeric_items(&self) -> Vec<f64> {
        match self {
            AttributeValue::Number(n) => vec![*n],
            AttributeValue::List(items) => {
                items.iter().filter_map(AttributeValue::as_f64).collect()
            }
            AttributeValue::Text(_) => Vec::new(),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Number(f64::from(value))
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        AttributeValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Attribute namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Produced by the feature extractor
    Raw,
    /// Produced by a category plugin from raw attributes
    Derived,
}

/// Fully qualified attribute name
///
/// Serialized as the bare name for raw attributes and as `derived.<name>`
/// for derived ones, which keeps weight maps readable in JSON config.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeKey {
    pub namespace: Namespace,
    pub name: String,
}

const DERIVED_PREFIX: &str = "derived.";

impl AttributeKey {
    pub fn raw(name: impl Into<String>) -> Self {
        Self { namespace: Namespace::Raw, name: name.into() }
    }

    pub fn derived(name: impl Into<String>) -> Self {
        Self { namespace: Namespace::Derived, name: name.into() }
    }

    pub fn is_derived(&self) -> bool {
        self.namespace == Namespace::Derived
    }

    /// Parse `derived.<name>` or a bare raw name
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix(DERIVED_PREFIX) {
            Some(name) => Self::derived(name),
            None => Self::raw(s),
        }
    }

    pub fn is_metadata(&self) -> bool {
        self.namespace == Namespace::Raw && METADATA_KEYS.contains(&self.name.as_str())
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace {
            Namespace::Raw => write!(f, "{}", self.name),
            Namespace::Derived => write!(f, "{}{}", DERIVED_PREFIX, self.name),
        }
    }
}

impl Serialize for AttributeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AttributeKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(AttributeKey::parse(&s))
    }
}

impl From<&str> for AttributeKey {
    fn from(s: &str) -> Self {
        AttributeKey::parse(s)
    }
}

/// Per-item feature vector
///
/// Immutable once produced: derived features are added through
/// [`AttributeMap::with_derived`], which returns a new map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeMap {
    #[serde(default)]
    raw: BTreeMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    derived: BTreeMap<String, AttributeValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw attributes only
    pub fn from_raw(raw: BTreeMap<String, AttributeValue>) -> Self {
        Self { raw, derived: BTreeMap::new() }
    }

    /// Builder-style insert of a raw attribute
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.raw.insert(name.into(), value.into());
        self
    }

    /// Returns a copy with the given derived entries merged in.
    /// Later entries replace earlier ones with the same name.
    pub fn with_derived<I>(&self, derived: I) -> Self
    where
        I: IntoIterator<Item = (String, AttributeValue)>,
    {
        let mut out = self.clone();
        out.derived.extend(derived);
        out
    }

    pub fn get(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        match key.namespace {
            Namespace::Raw => self.raw.get(&key.name),
            Namespace::Derived => self.derived.get(&key.name),
        }
    }

    pub fn raw(&self, name: &str) -> Option<&AttributeValue> {
        self.raw.get(name)
    }

    /// Numeric raw attribute, missing or non-numeric values read as 0
    pub fn number(&self, name: &str) -> f64 {
        self.raw.get(name).and_then(AttributeValue::as_f64).unwrap_or(0.0)
    }

    pub fn derived(&self, name: &str) -> Option<&AttributeValue> {
        self.derived.get(name)
    }

    pub fn raw_entries(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.raw.iter()
    }

    pub fn derived_entries(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.derived.iter()
    }

    /// All qualified keys, raw first, each namespace in name order
    pub fn keys(&self) -> impl Iterator<Item = AttributeKey> + '_ {
        self.raw
            .keys()
            .map(|k| AttributeKey::raw(k.clone()))
            .chain(self.derived.keys().map(|k| AttributeKey::derived(k.clone())))
    }

    pub fn len(&self) -> usize {
        self.raw.len() + self.derived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.derived.is_empty()
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_raw(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
