//! # AnchorX Market
//!
//! Market data access for the valuation engine.
//!
//! - [`MarketDataCollector`] - the one interface every listing source implements
//! - [`PreFilterBuilder`] - derives a coarse [`FilterSpec`](anchorx_core::FilterSpec)
//!   from the target item
//! - [`InMemoryCollector`] - thread-safe listing store for tests and small deployments

pub mod collector;
pub mod memory;
pub mod prefilter;

pub use collector::MarketDataCollector;
pub use memory::InMemoryCollector;
pub use prefilter::{FamilyBands, LevelBand, PreFilterBuilder, PreFilterConfig};
