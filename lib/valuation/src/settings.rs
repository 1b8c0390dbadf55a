//! Engine settings
//!
//! Every tunable of the valuation pipeline in one serde struct. Missing
//! fields take their defaults, so a settings file only needs the values
//! it changes.

use crate::aggregate::{PriceAggregator, PricingStrategy};
use crate::guard::GuardConfig;
use anchorx_core::{Error, Result};
use anchorx_market::PreFilterConfig;
use anchorx_similarity::OverridePrecedence;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub default_strategy: PricingStrategy,
    pub similarity_threshold: f64,
    pub max_anchors: usize,
    pub outlier_multiplier: f64,
    pub outlier_floor: usize,
    /// Threshold used by the distribution report
    pub report_threshold: f64,
    /// Anchor cap used by the distribution report
    pub report_max_anchors: usize,
    pub histogram_bins: usize,
    /// Run batch items on the rayon pool
    pub parallel_batch: bool,
    /// Applied by the registry bootstrap
    pub override_precedence: OverridePrecedence,
    pub prefilter: PreFilterConfig,
    pub guard: GuardConfig,
    pub aggregator: PriceAggregator,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_strategy: PricingStrategy::FairValue,
            similarity_threshold: 0.7,
            max_anchors: 20,
            outlier_multiplier: 1.0,
            outlier_floor: 3,
            report_threshold: 0.5,
            report_max_anchors: 50,
            histogram_bins: 10,
            parallel_batch: false,
            override_precedence: OverridePrecedence::default(),
            prefilter: PreFilterConfig::default(),
            guard: GuardConfig::default(),
            aggregator: PriceAggregator::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::InvalidRequest(format!("{} must be within [0, 1], got {}", name, v)))
            }
        };
        unit("similarity_threshold", self.similarity_threshold)?;
        unit("report_threshold", self.report_threshold)?;

        if self.max_anchors == 0 || self.report_max_anchors == 0 {
            return Err(Error::InvalidRequest("anchor caps must be positive".to_string()));
        }
        if !(self.outlier_multiplier.is_finite() && self.outlier_multiplier > 0.0) {
            return Err(Error::InvalidRequest(format!(
                "outlier_multiplier must be positive, got {}",
                self.outlier_multiplier
            )));
        }
        if self.histogram_bins == 0 {
            return Err(Error::InvalidRequest("histogram_bins must be positive".to_string()));
        }
        if !(self.guard.salvage_value.is_finite() && self.guard.salvage_value >= 0.0) {
            return Err(Error::InvalidRequest(
                "guard salvage_value must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
