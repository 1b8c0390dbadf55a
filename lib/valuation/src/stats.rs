//! Small descriptive statistics over price samples

use ordered_float::OrderedFloat;

/// Ascending copy of `values`
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by_key(|v| OrderedFloat(*v));
    out
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// std / mean, `None` when the mean is not positive
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m <= 0.0 {
        return None;
    }
    std_dev(values).map(|s| s / m)
}

/// Median of an ascending slice (mean of the middle pair for even length)
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Value at index ⌊q·n⌋ of an ascending slice, clamped to the last index.
/// No interpolation.
pub fn index_quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((q * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Lower weighted median over `(value, weight)` pairs: the first value in
/// ascending order whose cumulative weight reaches half the total.
/// Falls back to the unweighted lower median when no weight is positive.
pub fn weighted_median(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let mut pairs = pairs.to_vec();
    pairs.sort_by_key(|(value, _)| OrderedFloat(*value));

    let total: f64 = pairs.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return Some(pairs[(pairs.len() - 1) / 2].0);
    }

    let half = total / 2.0;
    let mut cumulative = 0.0;
    for (value, weight) in &pairs {
        cumulative += weight.max(0.0);
        if cumulative >= half {
            return Some(*value);
        }
    }
    pairs.last().map(|(value, _)| *value)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_median_single() {
        assert_eq!(weighted_median(&[(123.4, 0.8)]), Some(123.4));
        assert_eq!(weighted_median(&[]), None);
    }

    #[test]
    fn test_weighted_median_is_lower() {
        // equal weights, even count: the lower middle value
        let pairs = [(40.0, 1.0), (10.0, 1.0), (30.0, 1.0), (20.0, 1.0)];
        assert_eq!(weighted_median(&pairs), Some(20.0));
    }

    #[test]
    fn test_weighted_median_follows_weight() {
        let pairs = [(10.0, 0.1), (20.0, 0.1), (30.0, 5.0)];
        assert_eq!(weighted_median(&pairs), Some(30.0));
    }

    #[test]
    fn test_weighted_median_zero_weights() {
        let pairs = [(30.0, 0.0), (10.0, 0.0), (20.0, 0.0)];
        assert_eq!(weighted_median(&pairs), Some(20.0));
    }

    #[test]
    fn test_index_quantile() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(index_quantile(&values, 0.25), Some(2.0));
        assert_eq!(index_quantile(&values, 0.75), Some(4.0));
        assert_eq!(index_quantile(&values, 1.0), Some(5.0));
        assert_eq!(index_quantile(&[7.0], 0.75), Some(7.0));
    }

    #[test]
    fn test_spread() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        assert_eq!(std_dev(&values), Some(2.0));
        assert_eq!(coefficient_of_variation(&values), Some(0.4));
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), None);
    }

    #[test]
    fn test_median_and_round() {
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(round1(93.049), 93.0);
        assert_eq!(round1(92.96), 93.0);
    }
}
