//! # AnchorX Core
//!
//! Shared data model for the AnchorX market-anchor valuation engine.
//!
//! - [`AttributeMap`] - per-item feature vector with raw and derived namespaces
//! - [`Candidate`] - a market listing (id, attributes, price)
//! - [`Anchor`] - a candidate annotated with its similarity to the target
//! - [`FilterSpec`] - coarse narrowing handed to market data collectors
//! - [`Error`] - error taxonomy shared by every AnchorX crate
//!
//! ## Example
//!
//! ```rust
//! use anchorx_core::{AttributeMap, Candidate, Category, FilterSpec};
//!
//! let attrs = AttributeMap::new()
//!     .with("level", 80.0)
//!     .with("special_effects", vec![3.0, 9.0]);
//! let listing = Candidate::new("listing-1", attrs, 1250.0);
//!
//! let spec = FilterSpec::new(Category::new("weapon"));
//! assert!(spec.matches(&Category::new("weapon"), &listing.attributes));
//! ```

pub mod attribute;
pub mod candidate;
pub mod error;
pub mod filter;

pub use attribute::{AttributeKey, AttributeMap, AttributeValue, Namespace, METADATA_KEYS};
pub use candidate::{Anchor, Candidate, Category, EntityFamily};
pub use error::{Error, Result};
pub use filter::{FilterCondition, FilterSpec};
