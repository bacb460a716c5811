//! Fuzzy AHP via Chang's extent analysis.
//!
//! The crisp comparison matrix is mapped onto triangular fuzzy numbers
//! through a fixed nine-point scale, then per-criterion synthetic extents
//! are compared by possibility degree. No classical consistency ratio is
//! computed for the fuzzy variant.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput, CriterionWeight};
use crate::weighting::ahp::{validate_comparison_matrix, ComparisonMatrixInput};
use crate::GeoHazardResult;

const CONSISTENCY_NOTE: &str =
    "Classical consistency ratio is not computed; fuzzy arithmetic absorbs judgment inconsistency";

// ---------------------------------------------------------------------------
// Triangular fuzzy numbers
// ---------------------------------------------------------------------------

/// Triangular fuzzy number (lower, modal, upper), l <= m <= u.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tfn {
    pub l: f64,
    pub m: f64,
    pub u: f64,
}

impl Tfn {
    pub const fn new(l: f64, m: f64, u: f64) -> Self {
        Self { l, m, u }
    }

    /// Componentwise fuzzy addition.
    pub fn add(self, other: Self) -> Self {
        Self::new(self.l + other.l, self.m + other.m, self.u + other.u)
    }

    /// Fuzzy reciprocal: (1/u, 1/m, 1/l).
    pub fn reciprocal(self) -> Self {
        Self::new(1.0 / self.u, 1.0 / self.m, 1.0 / self.l)
    }

    /// Fuzzy division: (l1/u2, m1/m2, u1/l2).
    pub fn div(self, other: Self) -> Self {
        Self::new(self.l / other.u, self.m / other.m, self.u / other.l)
    }

    /// Centroid defuzzification: (l + m + u) / 3.
    pub fn defuzzify(self) -> f64 {
        (self.l + self.m + self.u) / 3.0
    }
}

/// Fixed nine-point fuzzy scale for Saaty intensities 1..=9.
fn scale_tfn(intensity: u32) -> Tfn {
    match intensity {
        1 => Tfn::new(1.0, 1.0, 1.0),
        2 => Tfn::new(1.0, 2.0, 3.0),
        3 => Tfn::new(2.0, 3.0, 4.0),
        4 => Tfn::new(3.0, 4.0, 5.0),
        5 => Tfn::new(4.0, 5.0, 6.0),
        6 => Tfn::new(5.0, 6.0, 7.0),
        7 => Tfn::new(6.0, 7.0, 8.0),
        8 => Tfn::new(7.0, 8.0, 9.0),
        _ => Tfn::new(8.0, 9.0, 9.0),
    }
}

/// Map one crisp off-diagonal judgment onto the fuzzy scale.
///
/// Values >= 1 round to the nearest intensity in [1,9]; values < 1 use the
/// reciprocal of the scale entry for round(1/v).
fn fuzzify_judgment(v: f64) -> Tfn {
    if v >= 1.0 {
        scale_tfn((v.round() as u32).clamp(1, 9))
    } else {
        scale_tfn(((1.0 / v).round() as u32).clamp(1, 9)).reciprocal()
    }
}

fn fuzzify_matrix(matrix: &[Vec<f64>]) -> Vec<Vec<Tfn>> {
    let n = matrix.len();
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        Tfn::new(1.0, 1.0, 1.0)
                    } else {
                        fuzzify_judgment(matrix[i][j])
                    }
                })
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Extent analysis
// ---------------------------------------------------------------------------

/// Per-criterion synthetic extents: fuzzy row sum divided by the fuzzy
/// grand total of all row sums.
fn synthetic_extents(fuzzy: &[Vec<Tfn>]) -> Vec<Tfn> {
    let row_sums: Vec<Tfn> = fuzzy
        .iter()
        .map(|row| {
            row.iter()
                .copied()
                .fold(Tfn::new(0.0, 0.0, 0.0), Tfn::add)
        })
        .collect();
    let total = row_sums
        .iter()
        .copied()
        .fold(Tfn::new(0.0, 0.0, 0.0), Tfn::add);
    row_sums.into_iter().map(|row| row.div(total)).collect()
}

/// Possibility degree V(M1 >= M2).
fn possibility_degree(m1: Tfn, m2: Tfn) -> f64 {
    if m1.m >= m2.m {
        1.0
    } else if m2.l >= m1.u {
        0.0
    } else {
        let ratio = (m2.l - m1.u) / ((m1.m - m1.u) - (m2.m - m2.l));
        if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Minimum possibility degree of each extent against all others.
fn min_possibility_degrees(extents: &[Tfn]) -> Vec<f64> {
    extents
        .iter()
        .enumerate()
        .map(|(i, &si)| {
            extents
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &sj)| possibility_degree(si, sj))
                .fold(1.0, f64::min)
        })
        .collect()
}

/// Normalize raw scores to a weight vector; degenerate all-zero minima fall
/// back to centroid defuzzification of the extents.
fn extent_weights(degrees: &[f64], extents: &[Tfn]) -> (Vec<f64>, bool) {
    let (raw, used_fallback) = if degrees.iter().all(|&d| d == 0.0) {
        (extents.iter().map(|e| e.defuzzify()).collect::<Vec<f64>>(), true)
    } else {
        (degrees.to_vec(), false)
    };
    let total: f64 = raw.iter().sum();
    (raw.iter().map(|d| d / total).collect(), used_fallback)
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Output of fuzzy AHP weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyAhpOutput {
    /// Normalized criterion weights (sum to 1).
    pub weights: Vec<CriterionWeight>,
    /// Synthetic extent per criterion, in criteria order.
    pub synthetic_extents: Vec<Tfn>,
    /// Why no consistency ratio accompanies these weights.
    pub consistency_note: String,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute fuzzy AHP criterion weights from a crisp comparison matrix.
pub fn calculate_fuzzy_ahp_weights(
    input: &ComparisonMatrixInput,
) -> GeoHazardResult<ComputationOutput<FuzzyAhpOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_comparison_matrix(input)?;

    let fuzzy = fuzzify_matrix(&input.matrix);
    let extents = synthetic_extents(&fuzzy);
    let degrees = min_possibility_degrees(&extents);
    let (weights, used_fallback) = extent_weights(&degrees, &extents);

    if used_fallback {
        warnings.push(
            "All minimum possibility degrees were 0; weights fall back to centroid defuzzification"
                .into(),
        );
    }

    let output = FuzzyAhpOutput {
        weights: input
            .criteria
            .iter()
            .zip(weights)
            .map(|(criterion, weight)| CriterionWeight {
                criterion: criterion.clone(),
                weight,
            })
            .collect(),
        synthetic_extents: extents,
        consistency_note: CONSISTENCY_NOTE.to_string(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Fuzzy AHP (Chang Extent Analysis)",
        &serde_json::json!({
            "criteria": input.criteria,
            "fuzzy_scale": "triangular, nine-point",
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
