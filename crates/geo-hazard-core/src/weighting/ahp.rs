//! Analytic Hierarchy Process weighting.
//!
//! Covers:
//! 1. **Reciprocal matrix validation** -- unit diagonal, a_ij * a_ji = 1.
//! 2. **Eigenvector weights** -- principal eigenvector of the comparison matrix.
//! 3. **Consistency ratio** -- CI / RI against Saaty's random index table.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::GeoHazardError;
use crate::types::{with_metadata, ComputationOutput, CriterionWeight};
use crate::GeoHazardResult;

/// Tolerance for the unit-diagonal and reciprocity invariants.
const RECIPROCITY_TOLERANCE: f64 = 1e-5;

/// Judgments with CR below this are considered consistent.
const CONSISTENCY_THRESHOLD: f64 = 0.10;

/// Saaty's random index for matrix orders 1 through 15.
const RANDOM_INDEX: [f64; 15] = [
    0.0, 0.0, 0.58, 0.90, 1.12, 1.24, 1.32, 1.41, 1.45, 1.49, 1.51, 1.48, 1.56, 1.57, 1.59,
];

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// A pairwise comparison matrix over named criteria.
///
/// `matrix[i][j]` expresses how much more important criterion `i` is than
/// criterion `j` on Saaty's 1-9 scale. Row-major, square, reciprocal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonMatrixInput {
    pub criteria: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

/// Judgment-quality report for one comparison matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Principal eigenvalue of the comparison matrix.
    pub lambda_max: f64,
    /// CI = (lambda_max - n) / (n - 1), 0 for a single criterion.
    pub consistency_index: f64,
    /// Saaty random index for the matrix order.
    pub random_index: f64,
    /// CR = CI / RI, 0 when RI is 0 (orders 1 and 2).
    pub consistency_ratio: f64,
    /// CR < 0.10.
    pub is_consistent: bool,
}

/// Output of AHP weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AhpOutput {
    /// Normalized criterion weights (sum to 1).
    pub weights: Vec<CriterionWeight>,
    pub consistency: ConsistencyReport,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub(crate) fn validate_comparison_matrix(input: &ComparisonMatrixInput) -> GeoHazardResult<()> {
    let n = input.criteria.len();
    if n == 0 {
        return Err(GeoHazardError::InsufficientData(
            "At least one criterion is required.".into(),
        ));
    }
    if input.matrix.len() != n {
        return Err(GeoHazardError::InvalidInput {
            field: "matrix".into(),
            reason: format!("Expected {n} rows to match criteria, got {}", input.matrix.len()),
        });
    }
    for (i, row) in input.matrix.iter().enumerate() {
        if row.len() != n {
            return Err(GeoHazardError::InvalidInput {
                field: "matrix".into(),
                reason: format!("Row {i} has {} columns, expected {n}", row.len()),
            });
        }
        for (j, &v) in row.iter().enumerate() {
            if !v.is_finite() || v <= 0.0 {
                return Err(GeoHazardError::InvalidInput {
                    field: "matrix".into(),
                    reason: format!("Entry ({i},{j}) must be a positive real, got {v}"),
                });
            }
        }
    }
    for i in 0..n {
        if (input.matrix[i][i] - 1.0).abs() > RECIPROCITY_TOLERANCE {
            return Err(GeoHazardError::InvalidInput {
                field: "matrix".into(),
                reason: format!("Diagonal entry ({i},{i}) must be 1, got {}", input.matrix[i][i]),
            });
        }
        for j in (i + 1)..n {
            let product = input.matrix[i][j] * input.matrix[j][i];
            if (product - 1.0).abs() > RECIPROCITY_TOLERANCE {
                return Err(GeoHazardError::InvalidInput {
                    field: "matrix".into(),
                    reason: format!(
                        "Reciprocity broken at ({i},{j}): a_ij * a_ji = {product}"
                    ),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Eigen solve
// ---------------------------------------------------------------------------

/// Principal eigenvalue and eigenvector of a validated comparison matrix.
///
/// The eigenvalue is selected by largest real part, never by array
/// position: eigen backends return eigenvalues in no guaranteed order.
/// The eigenvector is recovered by inverse iteration shifted slightly off
/// the selected eigenvalue.
fn principal_eigen(matrix: &[Vec<f64>]) -> GeoHazardResult<(f64, Vec<f64>)> {
    let n = matrix.len();
    if n == 1 {
        return Ok((1.0, vec![1.0]));
    }

    let a = DMatrix::from_fn(n, n, |i, j| matrix[i][j]);
    let eigenvalues = a.complex_eigenvalues();
    let lambda_max = eigenvalues
        .iter()
        .map(|e| e.re)
        .fold(f64::NEG_INFINITY, f64::max);

    // Shift just past lambda_max so (A - sigma*I) stays nonsingular.
    let mut sigma = lambda_max * (1.0 + 1e-6) + 1e-12;
    let mut vector: Option<DVector<f64>> = None;
    'attempts: for _ in 0..3 {
        let lu = (&a - DMatrix::identity(n, n) * sigma).lu();
        let mut v = DVector::from_element(n, 1.0 / n as f64);
        for _ in 0..100 {
            let mut next = match lu.solve(&v) {
                Some(next) if next.norm().is_finite() && next.norm() > 0.0 => next,
                _ => {
                    // Shift landed on the eigenvalue: nudge and refactor.
                    sigma += lambda_max.abs() * 1e-6 + 1e-9;
                    continue 'attempts;
                }
            };
            next /= next.norm();
            // Inverse iteration can flip sign between steps.
            let delta = (&next - &v).norm().min((&next + &v).norm());
            v = next;
            if delta < 1e-12 {
                break;
            }
        }
        vector = Some(v);
        break;
    }

    let v = vector.ok_or_else(|| GeoHazardError::InvalidInput {
        field: "matrix".into(),
        reason: "Eigenvector iteration failed to converge".into(),
    })?;

    let abs: Vec<f64> = v.iter().map(|x| x.abs()).collect();
    let total: f64 = abs.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(GeoHazardError::InvalidInput {
            field: "matrix".into(),
            reason: "Eigenvector normalization failed".into(),
        });
    }
    Ok((lambda_max, abs.iter().map(|x| x / total).collect()))
}

fn random_index(n: usize) -> f64 {
    if n == 0 {
        0.0
    } else if n <= RANDOM_INDEX.len() {
        RANDOM_INDEX[n - 1]
    } else {
        RANDOM_INDEX[RANDOM_INDEX.len() - 1]
    }
}

fn consistency_report(lambda_max: f64, n: usize) -> ConsistencyReport {
    let consistency_index = if n <= 1 {
        0.0
    } else {
        (lambda_max - n as f64) / (n as f64 - 1.0)
    };
    let ri = random_index(n);
    let consistency_ratio = if ri == 0.0 { 0.0 } else { consistency_index / ri };
    ConsistencyReport {
        lambda_max,
        consistency_index,
        random_index: ri,
        consistency_ratio,
        is_consistent: consistency_ratio < CONSISTENCY_THRESHOLD,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute AHP criterion weights and the consistency report.
///
/// Weights are the principal eigenvector of the comparison matrix
/// (real parts, absolute values, normalized to sum 1).
pub fn calculate_ahp_weights(
    input: &ComparisonMatrixInput,
) -> GeoHazardResult<ComputationOutput<AhpOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_comparison_matrix(input)?;

    let n = input.criteria.len();
    let (lambda_max, weights) = principal_eigen(&input.matrix)?;
    let consistency = consistency_report(lambda_max, n);

    if !consistency.is_consistent {
        warnings.push(format!(
            "Consistency ratio {:.4} exceeds {CONSISTENCY_THRESHOLD}; judgments should be revised",
            consistency.consistency_ratio
        ));
    }

    let output = AhpOutput {
        weights: input
            .criteria
            .iter()
            .zip(weights)
            .map(|(criterion, weight)| CriterionWeight {
                criterion: criterion.clone(),
                weight,
            })
            .collect(),
        consistency,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "AHP Eigenvector Weighting",
        &serde_json::json!({
            "criteria": input.criteria,
            "matrix_order": n,
            "consistency_threshold": CONSISTENCY_THRESHOLD,
        }),
        warnings,
        elapsed,
        output,
    ))
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

    /// Reference matrix over the five standard susceptibility criteria,
    /// built from the ratios of (4, 2, 4, 1, 1.5): elevation and
    /// drainage_proximity carry equal, largest importance.
    fn reference_input() -> ComparisonMatrixInput {
        let w = [4.0, 2.0, 4.0, 1.0, 1.5];
        let n = w.len();
        let matrix: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| w[i] / w[j]).collect())
            .collect();
        ComparisonMatrixInput {
            criteria: vec![
                "elevation".into(),
                "slope".into(),
                "drainage_proximity".into(),
                "land_use".into(),
                "soil_permeability".into(),
            ],
            matrix,
        }
    }

    fn three_by_three() -> ComparisonMatrixInput {
        ComparisonMatrixInput {
            criteria: vec!["a".into(), "b".into(), "c".into()],
            matrix: vec![
                vec![1.0, 2.0, 4.0],
                vec![0.5, 1.0, 3.0],
                vec![0.25, 1.0 / 3.0, 1.0],
            ],
        }
    }

    #[test]
    fn test_reference_matrix_consistent() {
        let out = calculate_ahp_weights(&reference_input()).unwrap();
        assert!(
            out.result.consistency.consistency_ratio < 0.10,
            "CR {} should be below 0.10",
            out.result.consistency.consistency_ratio
        );
        assert!(out.result.consistency.is_consistent);
    }

    #[test]
    fn test_reference_matrix_top_weight() {
        let out = calculate_ahp_weights(&reference_input()).unwrap();
        let top = out
            .result
            .weights
            .iter()
            .max_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap())
            .unwrap();
        assert!(
            top.criterion == "elevation" || top.criterion == "drainage_proximity",
            "Top weight on {}, expected elevation or drainage_proximity",
            top.criterion
        );
    }

    #[test]
    fn test_reference_matrix_tied_weights() {
        let out = calculate_ahp_weights(&reference_input()).unwrap();
        let elevation = out.result.weights[0].weight;
        let drainage = out.result.weights[2].weight;
        assert!(
            approx_eq(elevation, drainage, 1e-6),
            "elevation {elevation} and drainage {drainage} should tie"
        );
    }

    #[test]
    fn test_weights_sum_to_one() {
        let out = calculate_ahp_weights(&three_by_three()).unwrap();
        let sum: f64 = out.result.weights.iter().map(|w| w.weight).sum();
        assert!(approx_eq(sum, 1.0, 1e-9), "sum={sum}");
    }

    #[test]
    fn test_weights_non_negative() {
        let out = calculate_ahp_weights(&three_by_three()).unwrap();
        assert!(out.result.weights.iter().all(|w| w.weight >= 0.0));
    }

    #[test]
    fn test_consistent_matrix_recovers_ratios() {
        let input = ComparisonMatrixInput {
            criteria: vec!["a".into(), "b".into()],
            matrix: vec![vec![1.0, 3.0], vec![1.0 / 3.0, 1.0]],
        };
        let out = calculate_ahp_weights(&input).unwrap();
        assert!(approx_eq(out.result.weights[0].weight, 0.75, 1e-9));
        assert!(approx_eq(out.result.weights[1].weight, 0.25, 1e-9));
        assert!(approx_eq(out.result.consistency.lambda_max, 2.0, 1e-9));
        assert_eq!(out.result.consistency.consistency_ratio, 0.0);
    }

    #[test]
    fn test_cr_permutation_invariant() {
        let base = three_by_three();
        // Swap criteria 0 and 2: P * A * P^T.
        let perm = [2usize, 1, 0];
        let permuted = ComparisonMatrixInput {
            criteria: perm.iter().map(|&i| base.criteria[i].clone()).collect(),
            matrix: perm
                .iter()
                .map(|&i| perm.iter().map(|&j| base.matrix[i][j]).collect())
                .collect(),
        };
        let cr_a = calculate_ahp_weights(&base)
            .unwrap()
            .result
            .consistency
            .consistency_ratio;
        let cr_b = calculate_ahp_weights(&permuted)
            .unwrap()
            .result
            .consistency
            .consistency_ratio;
        assert!(approx_eq(cr_a, cr_b, 1e-6), "CR {cr_a} vs {cr_b}");
    }

    #[test]
    fn test_single_criterion() {
        let input = ComparisonMatrixInput {
            criteria: vec!["only".into()],
            matrix: vec![vec![1.0]],
        };
        let out = calculate_ahp_weights(&input).unwrap();
        assert_eq!(out.result.weights.len(), 1);
        assert!(approx_eq(out.result.weights[0].weight, 1.0, 1e-12));
        assert_eq!(out.result.consistency.consistency_index, 0.0);
        assert_eq!(out.result.consistency.consistency_ratio, 0.0);
        assert!(out.result.consistency.is_consistent);
    }

    #[test]
    fn test_inconsistent_matrix_flagged() {
        // Strong preference cycle: a > b, b > c, c > a.
        let input = ComparisonMatrixInput {
            criteria: vec!["a".into(), "b".into(), "c".into()],
            matrix: vec![
                vec![1.0, 5.0, 0.2],
                vec![0.2, 1.0, 5.0],
                vec![5.0, 0.2, 1.0],
            ],
        };
        let out = calculate_ahp_weights(&input).unwrap();
        assert!(!out.result.consistency.is_consistent);
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_random_index_table() {
        assert_eq!(random_index(1), 0.0);
        assert_eq!(random_index(2), 0.0);
        assert_eq!(random_index(3), 0.58);
        assert_eq!(random_index(10), 1.49);
        assert_eq!(random_index(12), 1.48);
        assert_eq!(random_index(15), 1.59);
        assert_eq!(random_index(40), 1.59);
    }

    #[test]
    fn test_reject_shape_mismatch() {
        let input = ComparisonMatrixInput {
            criteria: vec!["a".into(), "b".into()],
            matrix: vec![vec![1.0, 2.0]],
        };
        assert!(calculate_ahp_weights(&input).is_err());
    }

    #[test]
    fn test_reject_ragged_row() {
        let input = ComparisonMatrixInput {
            criteria: vec!["a".into(), "b".into()],
            matrix: vec![vec![1.0, 2.0], vec![0.5]],
        };
        assert!(calculate_ahp_weights(&input).is_err());
    }

    #[test]
    fn test_reject_non_unit_diagonal() {
        let input = ComparisonMatrixInput {
            criteria: vec!["a".into(), "b".into()],
            matrix: vec![vec![2.0, 2.0], vec![0.5, 1.0]],
        };
        assert!(calculate_ahp_weights(&input).is_err());
    }

    #[test]
    fn test_reject_broken_reciprocity() {
        let input = ComparisonMatrixInput {
            criteria: vec!["a".into(), "b".into()],
            matrix: vec![vec![1.0, 2.0], vec![0.9, 1.0]],
        };
        assert!(calculate_ahp_weights(&input).is_err());
    }

    #[test]
    fn test_reject_non_positive_entry() {
        let input = ComparisonMatrixInput {
            criteria: vec!["a".into(), "b".into()],
            matrix: vec![vec![1.0, -2.0], vec![-0.5, 1.0]],
        };
        assert!(calculate_ahp_weights(&input).is_err());
    }

    #[test]
    fn test_reject_empty_criteria() {
        let input = ComparisonMatrixInput {
            criteria: vec![],
            matrix: vec![],
        };
        assert!(calculate_ahp_weights(&input).is_err());
    }

    #[test]
    fn test_reciprocity_tolerance_accepted() {
        // Within the 1e-5 tolerance band.
        let input = ComparisonMatrixInput {
            criteria: vec!["a".into(), "b".into()],
            matrix: vec![vec![1.0, 2.0], vec![0.500001, 1.0]],
        };
        assert!(calculate_ahp_weights(&input).is_ok());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let out = calculate_ahp_weights(&reference_input()).unwrap();
        let json = serde_json::to_string(&out.result).unwrap();
        let _: AhpOutput = serde_json::from_str(&json).unwrap();
    }
}
