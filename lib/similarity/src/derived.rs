//! Derived feature rules
//!
//! Turn raw attribute values into normalized 0-100 scores through lookup
//! tables, either directly on the raw value or relative to a
//! level-dependent expectation.

use crate::config::ConfigError;
use anchorx_core::{AttributeMap, AttributeValue};
use serde::{Deserialize, Serialize};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

fn default_level_key() -> String {
    "level".to_string()
}

fn default_supersede() -> bool {
    true
}

/// Piecewise-linear interpolation over `(x, y)` points sorted by x.
/// Values outside the table clamp to the first / last point.
pub fn interpolate(table: &[[f64; 2]], x: f64) -> f64 {
    let (first, last) = match (table.first(), table.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return 0.0,
    };
    if x <= first[0] {
        return first[1];
    }
    if x >= last[0] {
        return last[1];
    }
    for w in table.windows(2) {
        let (lo, hi) = (w[0], w[1]);
        if x >= lo[0] && x <= hi[0] {
            let span = hi[0] - lo[0];
            if span <= 0.0 {
                return hi[1];
            }
            return lo[1] + (hi[1] - lo[1]) * (x - lo[0]) / span;
        }
    }
    last[1]
}

/// How the raw value a rule reads is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Numeric value of the attribute
    #[default]
    Value,
    /// Number of entries of a list attribute
    Count,
    /// Sum of the numeric entries of a list attribute
    Sum,
}

impl SourceMode {
    fn read(self, attrs: &AttributeMap, source: &str) -> f64 {
        let value = attrs.raw(source);
        match self {
            SourceMode::Value => value.and_then(AttributeValue::as_f64).unwrap_or(0.0),
            SourceMode::Count => {
                value.and_then(AttributeValue::as_list).map(|l| l.len() as f64).unwrap_or(0.0)
            }
            SourceMode::Sum => value.map(|v| v.numeric_items().iter().sum()).unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedRule {
    /// score = table(raw value)
    Lookup {
        name: String,
        source: String,
        #[serde(default)]
        mode: SourceMode,
        table: Vec<[f64; 2]>,
        #[serde(default = "default_supersede")]
        supersede: bool,
    },
    /// score = 100 * raw value / expected(level)
    LevelRatio {
        name: String,
        source: String,
        #[serde(default = "default_level_key")]
        level_key: String,
        expected: Vec<[f64; 2]>,
        #[serde(default = "default_supersede")]
        supersede: bool,
    },
}

impl DerivedRule {
    pub fn lookup(name: &str, source: &str, table: Vec<[f64; 2]>) -> Self {
        DerivedRule::Lookup {
            name: name.to_string(),
            source: source.to_string(),
            mode: SourceMode::Value,
            table,
            supersede: true,
        }
    }

    pub fn lookup_with_mode(
        name: &str,
        source: &str,
        mode: SourceMode,
        table: Vec<[f64; 2]>,
    ) -> Self {
        DerivedRule::Lookup {
            name: name.to_string(),
            source: source.to_string(),
            mode,
            table,
            supersede: true,
        }
    }

    pub fn level_ratio(name: &str, source: &str, expected: Vec<[f64; 2]>) -> Self {
        DerivedRule::LevelRatio {
            name: name.to_string(),
            source: source.to_string(),
            level_key: default_level_key(),
            expected,
            supersede: true,
        }
    }

    /// Name of the derived attribute this rule writes
    pub fn name(&self) -> &str {
        match self {
            DerivedRule::Lookup { name, .. } | DerivedRule::LevelRatio { name, .. } => name,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            DerivedRule::Lookup { source, .. } | DerivedRule::LevelRatio { source, .. } => source,
        }
    }

    /// Raw attribute this rule replaces, if any
    pub fn superseded(&self) -> Option<&str> {
        match self {
            DerivedRule::Lookup { source, supersede, .. }
            | DerivedRule::LevelRatio { source, supersede, .. } => {
                supersede.then_some(source.as_str())
            }
        }
    }

    /// Evaluate the rule, clamped to 0-100. Missing inputs read as 0 so
    /// target and candidates always get the same set of derived keys.
    pub fn evaluate(&self, attrs: &AttributeMap) -> f64 {
        let score = match self {
            DerivedRule::Lookup { source, mode, table, .. } => {
                interpolate(table, mode.read(attrs, source))
            }
            DerivedRule::LevelRatio { source, level_key, expected, .. } => {
                let expected = interpolate(expected, attrs.number(level_key));
                if expected <= 0.0 {
                    0.0
                } else {
                    SCORE_MAX * attrs.number(source) / expected
                }
            }
        };
        if score.is_finite() {
            score.clamp(SCORE_MIN, SCORE_MAX)
        } else {
            SCORE_MIN
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let table = match self {
            DerivedRule::Lookup { table, .. } => table,
            DerivedRule::LevelRatio { expected, .. } => expected,
        };
        let sorted = table.windows(2).all(|w| w[0][0] <= w[1][0]);
        let finite = table.iter().all(|p| p[0].is_finite() && p[1].is_finite());
        if table.is_empty() || !sorted || !finite {
            return Err(ConfigError::InvalidLookupTable(self.name().to_string()));
        }
        Ok(())
    }
}
