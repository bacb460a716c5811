//! Pairwise significance statistics shared by the model comparator.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::error::GeoHazardError;
use crate::GeoHazardResult;

/// Result of one pairwise model test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseTestResult {
    pub test_name: String,
    pub model_a: String,
    pub model_b: String,
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    /// Better model name; only set when the difference is significant.
    pub winner: Option<String>,
}

/// Sample standard deviation; 0 for fewer than two values.
pub(crate) fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

/// Pearson correlation of two equal-length vectors; 0 when either side has
/// zero variance.
pub(crate) fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a) * (x - mean_a);
        var_b += (y - mean_b) * (y - mean_b);
    }
    if var_a == 0.0 || var_b == 0.0 {
        0.0
    } else {
        cov / (var_a.sqrt() * var_b.sqrt())
    }
}

/// Two-sided p-value of a z statistic under the standard normal.
pub(crate) fn normal_two_sided_p(z: f64) -> GeoHazardResult<f64> {
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| GeoHazardError::Configuration(format!("standard normal: {e}")))?;
    Ok((2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0))
}

/// Survival probability of a chi-square statistic with one degree of
/// freedom.
pub(crate) fn chi_square_survival_df1(statistic: f64) -> GeoHazardResult<f64> {
    if statistic <= 0.0 {
        return Ok(1.0);
    }
    let chi = ChiSquared::new(1.0)
        .map_err(|e| GeoHazardError::Configuration(format!("chi-square df=1: {e}")))?;
    Ok((1.0 - chi.cdf(statistic)).clamp(0.0, 1.0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_sample_std_dev() {
        assert!(approx_eq(sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.138, 1e-3));
        assert_eq!(sample_std_dev(&[1.0]), 0.0);
        assert_eq!(sample_std_dev(&[]), 0.0);
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert!(approx_eq(pearson_correlation(&a, &b), 1.0, 1e-12));
    }

    #[test]
    fn test_pearson_perfect_anticorrelation() {
        let a = [1.0, 2.0, 3.0];
        let b = [3.0, 2.0, 1.0];
        assert!(approx_eq(pearson_correlation(&a, &b), -1.0, 1e-12));
    }

    #[test]
    fn test_pearson_zero_variance_fallback() {
        let a = [1.0, 1.0, 1.0];
        let b = [1.0, 2.0, 3.0];
        assert_eq!(pearson_correlation(&a, &b), 0.0);
    }

    #[test]
    fn test_normal_two_sided_p_at_critical_value() {
        let p = normal_two_sided_p(1.959964).unwrap();
        assert!(approx_eq(p, 0.05, 1e-4), "p={p}");
    }

    #[test]
    fn test_normal_two_sided_p_symmetric() {
        let p_pos = normal_two_sided_p(1.3).unwrap();
        let p_neg = normal_two_sided_p(-1.3).unwrap();
        assert_eq!(p_pos, p_neg);
    }

    #[test]
    fn test_normal_two_sided_p_zero_statistic() {
        assert!(approx_eq(normal_two_sided_p(0.0).unwrap(), 1.0, 1e-12));
    }

    #[test]
    fn test_chi_square_survival_at_critical_value() {
        let p = chi_square_survival_df1(3.841459).unwrap();
        assert!(approx_eq(p, 0.05, 1e-4), "p={p}");
    }

    #[test]
    fn test_chi_square_survival_zero_statistic() {
        assert_eq!(chi_square_survival_df1(0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_chi_square_survival_large_statistic() {
        assert!(chi_square_survival_df1(100.0).unwrap() < 1e-10);
    }
}
