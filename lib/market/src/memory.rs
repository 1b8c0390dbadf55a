//! In-memory listing store
//!
//! Listings are grouped by category and kept in insertion order. When a
//! registry is attached, each listing is tagged with the plugins'
//! pre-filter extras at insert time so fetches never re-run plugins.

use crate::collector::MarketDataCollector;
use ahash::AHashMap;
use anchorx_core::{Candidate, Category, Error, FilterSpec, Result};
use anchorx_similarity::PluginRegistry;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Listing {
    candidate: Candidate,
    tags: BTreeMap<String, Value>,
}

/// Thread-safe listing store usable as a [`MarketDataCollector`]
pub struct InMemoryCollector {
    name: String,
    registry: Option<Arc<PluginRegistry>>,
    listings: Arc<RwLock<AHashMap<Category, Vec<Listing>>>>,
}

impl Default for InMemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCollector {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            registry: None,
            listings: Arc::new(RwLock::new(AHashMap::new())),
        }
    }

    /// Store that tags listings with the registry's pre-filter extras
    pub fn with_registry(registry: Arc<PluginRegistry>) -> Self {
        Self { registry: Some(registry), ..Self::new() }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Insert or replace a listing (matched by id within the category)
    pub fn upsert(&self, category: &Category, candidate: Candidate) -> Result<()> {
        if !candidate.price.is_finite() || candidate.price < 0.0 {
            return Err(Error::InvalidRequest(format!(
                "listing {} has invalid price {}",
                candidate.id, candidate.price
            )));
        }

        let tags = self
            .registry
            .as_ref()
            .map(|r| r.prefilter_extras(category, &candidate.attributes))
            .unwrap_or_default();
        let listing = Listing { candidate, tags };

        let mut listings = self.listings.write();
        let bucket = listings.entry(category.clone()).or_default();
        match bucket.iter_mut().find(|l| l.candidate.id == listing.candidate.id) {
            Some(existing) => *existing = listing,
            None => bucket.push(listing),
        }
        Ok(())
    }

    /// Insert many listings; stops at the first invalid one
    pub fn batch_upsert(&self, category: &Category, candidates: Vec<Candidate>) -> Result<()> {
        for candidate in candidates {
            self.upsert(category, candidate)?;
        }
        Ok(())
    }

    pub fn delete(&self, category: &Category, id: &str) -> bool {
        let mut listings = self.listings.write();
        match listings.get_mut(category) {
            Some(bucket) => {
                let before = bucket.len();
                bucket.retain(|l| l.candidate.id != id);
                bucket.len() != before
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.listings.read().values().map(Vec::len).sum()
    }

    pub fn count_in(&self, category: &Category) -> usize {
        self.listings.read().get(category).map(Vec::len).unwrap_or(0)
    }
}

impl MarketDataCollector for InMemoryCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_candidates(&self, spec: &FilterSpec) -> Result<Vec<Candidate>> {
        let listings = self.listings.read();
        let Some(bucket) = listings.get(&spec.category) else {
            return Ok(Vec::new());
        };

        let found: Vec<Candidate> = bucket
            .iter()
            .filter(|l| spec.matches(&spec.category, &l.candidate.attributes))
            .filter(|l| spec.extras_compatible(&l.tags))
            .map(|l| l.candidate.clone())
            .collect();

        tracing::trace!(
            collector = %self.name,
            category = %spec.category,
            stored = bucket.len(),
            returned = found.len(),
            "fetched candidates"
        );
        Ok(found)
    }
}
