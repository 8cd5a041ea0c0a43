//! Regime classification and correlated-feature pruning.

use tc_types::{FeatureView, Regime};

use crate::config::ClassifierConfig;

/// Assign a training segment to a regime.
///
/// Exactly `min_history` observations is enough history, and a zero fraction
/// exactly at `zero_threshold` stays general.
pub fn classify(values: &[f64], config: &ClassifierConfig) -> Regime {
    if values.len() < config.min_history {
        return Regime::NewProduct;
    }
    if zero_ratio(values, config.zero_tolerance) > config.zero_threshold {
        return Regime::Intermittent;
    }
    Regime::General
}

pub fn zero_ratio(values: &[f64], tolerance: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| v.abs() <= tolerance).count() as f64 / values.len() as f64
}

/// Outcome of correlation pruning, in dataset column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSelection {
    pub kept: Vec<String>,
    pub pruned: Vec<String>,
}

/// Greedily keep columns in order, dropping any whose absolute correlation with
/// an already-kept column exceeds `threshold`.
pub fn prune_correlated(features: &[FeatureView<'_>], threshold: f64) -> FeatureSelection {
    let mut selection = FeatureSelection::default();
    let mut kept: Vec<&FeatureView<'_>> = Vec::new();

    for column in features {
        let redundant = kept
            .iter()
            .any(|k| pearson(k.values, column.values).abs() > threshold);
        if redundant {
            selection.pruned.push(column.name.to_string());
        } else {
            selection.kept.push(column.name.to_string());
            kept.push(column);
        }
    }
    selection
}

/// Pearson correlation; 0 when either column has no variance.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return 0.0;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClassifierConfig {
        ClassifierConfig::default()
    }

    #[test]
    fn short_history_is_new_product() {
        assert_eq!(classify(&[5.0; 13], &config()), Regime::NewProduct);
        assert_eq!(classify(&[5.0; 14], &config()), Regime::General);
        assert_eq!(classify(&[], &config()), Regime::NewProduct);
    }

    #[test]
    fn zero_threshold_is_exclusive() {
        // exactly 60% zeros stays general
        let values: Vec<f64> = (0..20).map(|i| if i < 12 { 0.0 } else { 3.0 }).collect();
        assert_eq!(classify(&values, &config()), Regime::General);

        let values: Vec<f64> = (0..20).map(|i| if i < 13 { 0.0 } else { 3.0 }).collect();
        assert_eq!(classify(&values, &config()), Regime::Intermittent);
    }

    #[test]
    fn near_zero_values_count_as_zero() {
        let values: Vec<f64> = (0..20).map(|i| if i < 15 { 1e-12 } else { 3.0 }).collect();
        assert_eq!(classify(&values, &config()), Regime::Intermittent);
        assert_eq!(zero_ratio(&values, 1e-8), 0.75);
    }

    #[test]
    fn mostly_zero_long_series_is_intermittent() {
        let values: Vec<f64> = (0..50).map(|i| if i % 20 == 0 { 4.0 } else { 0.0 }).collect();
        assert_eq!(classify(&values, &config()), Regime::Intermittent);
    }

    #[test]
    fn pruning_keeps_first_of_correlated_pair() {
        let a: Vec<f64> = (0..30).map(f64::from).collect();
        let b: Vec<f64> = a.iter().map(|v| 2.0 * v + 1.0).collect();
        let c: Vec<f64> = (0..30).map(|i| ((i * 7) % 5) as f64).collect();
        let d: Vec<f64> = a.iter().map(|v| -v).collect();
        let features = [
            FeatureView { name: "a", values: &a },
            FeatureView { name: "b", values: &b },
            FeatureView { name: "c", values: &c },
            FeatureView { name: "d", values: &d },
        ];
        let selection = prune_correlated(&features, 0.8);
        assert_eq!(selection.kept, vec!["a", "c"]);
        assert_eq!(selection.pruned, vec!["b", "d"]);
    }

    #[test]
    fn constant_columns_are_uncorrelated() {
        let a = [1.0; 10];
        let b: Vec<f64> = (0..10).map(f64::from).collect();
        assert_eq!(pearson(&a, &b), 0.0);
        let features = [
            FeatureView { name: "flat", values: &a },
            FeatureView { name: "ramp", values: &b },
        ];
        assert_eq!(prune_correlated(&features, 0.8).kept.len(), 2);
    }

    #[test]
    fn correlation_exactly_at_threshold_is_kept() {
        let a: Vec<f64> = (0..10).map(f64::from).collect();
        assert!((pearson(&a, &a) - 1.0).abs() < 1e-12);
        let features = [
            FeatureView { name: "x", values: &a },
            FeatureView { name: "y", values: &a },
        ];
        // |r| = 1 is not above a threshold of 1
        assert_eq!(prune_correlated(&features, 1.0).pruned.len(), 0);
    }
}
