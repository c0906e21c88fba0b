use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// How many of the most extreme capacitances to drop before averaging.
pub const DEFAULT_OUTLIER_COUNT: usize = 1;

/// Summary statistics over the valid per-cycle capacitances.
///
/// `mean` is the robust (trimmed) point estimate; `min`, `max`, `std_dev`
/// and `variation_coefficient` describe the raw scatter of the full valid
/// set, before trimming, so consumers see the real dispersion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub variation_coefficient: f64,
}

impl Aggregate {
    /// Aggregate the valid capacitances, trimming up to `outlier_count`
    /// extreme values from the mean. Fails when nothing valid remains.
    pub fn compute(values: &[f64], outlier_count: usize) -> Result<Self, AnalysisError> {
        if values.is_empty() {
            return Err(AnalysisError::AllCyclesRejected);
        }

        let count = values.len();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std_dev = sample_std_dev(values);
        let mean = robust_mean(values, outlier_count);
        let variation_coefficient = if mean != 0.0 { std_dev / mean } else { 0.0 };

        Ok(Aggregate {
            count,
            mean,
            min,
            max,
            std_dev,
            variation_coefficient,
        })
    }
}

/// Trimmed mean: drop the `outlier_count` values furthest from the mean in
/// z-score terms, then average the remainder.
///
/// With too few values to trim, or identical values (zero spread), the
/// plain mean is returned unchanged. Ties in z-score keep their original
/// relative order (stable sort), so which duplicate gets dropped is
/// deterministic.
pub fn robust_mean(values: &[f64], outlier_count: usize) -> f64 {
    if values.len() <= outlier_count {
        return mean(values);
    }

    let m = mean(values);
    let stdev = sample_std_dev(values);
    if stdev == 0.0 {
        return m;
    }

    let mut scored: Vec<(f64, f64)> = values.iter().map(|&v| ((v - m).abs() / stdev, v)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let remaining: Vec<f64> = scored[outlier_count..].iter().map(|&(_, v)| v).collect();
    if remaining.is_empty() {
        return m;
    }
    mean(&remaining)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0 for a single value.
fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_values_average_to_themselves() {
        let values = [2.5e-3; 5];
        for outlier_count in 0..6 {
            assert_eq!(robust_mean(&values, outlier_count), 2.5e-3);
        }
    }

    #[test]
    fn trims_the_most_extreme_value() {
        let values = [1.0, 1.0, 1.0, 10.0];
        let avg = robust_mean(&values, 1);
        assert!((avg - 1.0).abs() < 1e-12);
    }

    #[test]
    fn too_few_values_fall_back_to_plain_mean() {
        let values = [3.0];
        assert_eq!(robust_mean(&values, 1), 3.0);
        assert_eq!(robust_mean(&[2.0, 4.0], 2), 3.0);
    }

    #[test]
    fn dispersion_uses_untrimmed_set() {
        let values = [1.0, 1.0, 1.0, 10.0];
        let agg = Aggregate::compute(&values, 1).unwrap();

        assert!((agg.mean - 1.0).abs() < 1e-12);
        assert_eq!(agg.min, 1.0);
        assert_eq!(agg.max, 10.0);
        // std_dev over all four values, not the trimmed remainder
        assert!((agg.std_dev - 4.5).abs() < 1e-12);
        assert!((agg.variation_coefficient - 4.5).abs() < 1e-12);
    }

    #[test]
    fn empty_set_is_a_failure() {
        assert!(matches!(
            Aggregate::compute(&[], 1),
            Err(AnalysisError::AllCyclesRejected)
        ));
    }

    #[test]
    fn single_value_has_zero_spread() {
        let agg = Aggregate::compute(&[1.5e-3], 1).unwrap();
        assert_eq!(agg.mean, 1.5e-3);
        assert_eq!(agg.std_dev, 0.0);
        assert_eq!(agg.variation_coefficient, 0.0);
    }
}
