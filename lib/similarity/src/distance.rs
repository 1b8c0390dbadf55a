//! Per-attribute similarity functions
//!
//! All functions return a similarity in [0.0, 1.0] where 1.0 means identical.

use anchorx_core::AttributeValue;
use std::collections::HashSet;

/// Similarity when exactly one side of a relative comparison is zero
pub const PRESENCE_MISMATCH_SIMILARITY: f64 = 0.1;

/// Similarity of differing values for attributes without a tolerance
pub const NEUTRAL_SIMILARITY: f64 = 0.5;

/// Similarity of structurally different list values
pub const LIST_MISMATCH_SIMILARITY: f64 = 0.1;

/// Relative tolerance band
///
/// d = |a - b| / max(|a|, |b|); 1.0 for d <= tau, linear decay to 0.0
/// over (tau, 2 * tau], 0.0 beyond.
pub fn relative_similarity(a: f64, b: f64, tau: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        return 1.0;
    }
    if a == 0.0 || b == 0.0 {
        return PRESENCE_MISMATCH_SIMILARITY;
    }
    if tau <= 0.0 {
        return exact_number_similarity(a, b);
    }

    let max = a.abs().max(b.abs());
    let d = (a - b).abs() / max;

    if d <= tau {
        1.0
    } else if d <= 2.0 * tau {
        (1.0 - (d - tau) / tau).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn exact_number_similarity(a: f64, b: f64) -> f64 {
    if (a - b).abs() < f64::EPSILON {
        1.0
    } else {
        0.0
    }
}

/// Exact structural match on any value type
pub fn exact_similarity(a: &AttributeValue, b: &AttributeValue) -> f64 {
    if a.same_as(b) {
        1.0
    } else {
        0.0
    }
}

/// Bucket index of `value` given ascending `bounds`
pub fn tier_of(value: f64, bounds: &[f64]) -> usize {
    bounds.iter().take_while(|b| value >= **b).count()
}

/// Tiered bucket similarity: each bucket apart costs `step_penalty`
pub fn tiered_similarity(a: f64, b: f64, bounds: &[f64], step_penalty: f64) -> f64 {
    let distance = tier_of(a, bounds).abs_diff(tier_of(b, bounds)) as f64;
    (1.0 - step_penalty * distance).clamp(0.0, 1.0)
}

/// Structured values compare by structural equality only
pub fn list_similarity(a: &AttributeValue, b: &AttributeValue) -> f64 {
    if a.same_as(b) {
        1.0
    } else {
        LIST_MISMATCH_SIMILARITY
    }
}

/// Comparison for attributes with no tolerance configured
pub fn neutral_similarity(a: &AttributeValue, b: &AttributeValue) -> f64 {
    if a.same_as(b) {
        1.0
    } else {
        NEUTRAL_SIMILARITY
    }
}

fn item_token(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Number(n) => format!("{}", n),
        AttributeValue::Text(s) => s.trim().to_lowercase(),
        AttributeValue::List(_) => format!("{:?}", value),
    }
}

/// Jaccard overlap of two lists treated as sets (order-insensitive).
/// Scalars count as one-element sets.
pub fn overlap_similarity(a: &AttributeValue, b: &AttributeValue) -> f64 {
    let to_set = |v: &AttributeValue| -> HashSet<String> {
        match v {
            AttributeValue::List(items) => items.iter().map(item_token).collect(),
            other if other.is_default() => HashSet::new(),
            other => std::iter::once(item_token(other)).collect(),
        }
    };

    let set_a = to_set(a);
    let set_b = to_set(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
