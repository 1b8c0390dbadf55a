use anchorx_core::{Candidate, FilterSpec, Result};
use std::sync::Arc;

/// Source of comparable market listings.
///
/// Implementations must enforce the category match. Remaining filter
/// conditions narrow the result set for performance; a collector may
/// apply fewer of them but must not drop listings that satisfy them.
/// Nothing matching is an empty vector, not an error.
pub trait MarketDataCollector: Send + Sync {
    /// Collector name, used in logs and retrieval errors
    fn name(&self) -> &str;

    fn fetch_candidates(&self, spec: &FilterSpec) -> Result<Vec<Candidate>>;
}

impl<T: MarketDataCollector + ?Sized> MarketDataCollector for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_candidates(&self, spec: &FilterSpec) -> Result<Vec<Candidate>> {
        (**self).fetch_candidates(spec)
    }
}

impl<T: MarketDataCollector + ?Sized> MarketDataCollector for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_candidates(&self, spec: &FilterSpec) -> Result<Vec<Candidate>> {
        (**self).fetch_candidates(spec)
    }
}
