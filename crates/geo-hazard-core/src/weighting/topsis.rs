//! TOPSIS ranking: distance to ideal and anti-ideal reference points.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::GeoHazardError;
use crate::types::{with_metadata, ComputationOutput};
use crate::GeoHazardResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Decision matrix over alternatives and criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopsisInput {
    pub alternatives: Vec<String>,
    pub criteria: Vec<String>,
    /// Per-criterion weights; renormalized when they do not sum to 1.
    pub weights: Vec<f64>,
    /// Per-criterion direction; `None` treats every criterion as beneficial.
    #[serde(default)]
    pub beneficial: Option<Vec<bool>>,
    /// Row-major: `matrix[alternative][criterion]`.
    pub matrix: Vec<Vec<f64>>,
}

/// One ranked alternative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeScore {
    /// 1-based rank, descending by closeness.
    pub rank: usize,
    pub alternative: String,
    /// Relative closeness to the ideal solution, in [0, 1].
    pub closeness: f64,
    /// Euclidean separation from the ideal solution.
    pub ideal_separation: f64,
    /// Euclidean separation from the anti-ideal solution.
    pub anti_ideal_separation: f64,
}

/// Output of TOPSIS ranking, ordered best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopsisOutput {
    pub rankings: Vec<AlternativeScore>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &TopsisInput) -> GeoHazardResult<()> {
    if input.alternatives.is_empty() {
        return Err(GeoHazardError::InsufficientData(
            "At least one alternative is required.".into(),
        ));
    }
    if input.criteria.is_empty() {
        return Err(GeoHazardError::InsufficientData(
            "At least one criterion is required.".into(),
        ));
    }
    if input.weights.len() != input.criteria.len() {
        return Err(GeoHazardError::InvalidInput {
            field: "weights".into(),
            reason: format!(
                "Expected {} weights, got {}",
                input.criteria.len(),
                input.weights.len()
            ),
        });
    }
    if input.weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(GeoHazardError::InvalidInput {
            field: "weights".into(),
            reason: "Weights must be finite and non-negative".into(),
        });
    }
    if input.weights.iter().sum::<f64>() <= 0.0 {
        return Err(GeoHazardError::InvalidInput {
            field: "weights".into(),
            reason: "Weights must not all be zero".into(),
        });
    }
    if let Some(flags) = &input.beneficial {
        if flags.len() != input.criteria.len() {
            return Err(GeoHazardError::InvalidInput {
                field: "beneficial".into(),
                reason: format!(
                    "Expected {} flags, got {}",
                    input.criteria.len(),
                    flags.len()
                ),
            });
        }
    }
    if input.matrix.len() != input.alternatives.len() {
        return Err(GeoHazardError::InvalidInput {
            field: "matrix".into(),
            reason: format!(
                "Expected {} rows, got {}",
                input.alternatives.len(),
                input.matrix.len()
            ),
        });
    }
    for (i, row) in input.matrix.iter().enumerate() {
        if row.len() != input.criteria.len() {
            return Err(GeoHazardError::InvalidInput {
                field: "matrix".into(),
                reason: format!(
                    "Row {i} has {} columns, expected {}",
                    row.len(),
                    input.criteria.len()
                ),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(GeoHazardError::InvalidInput {
                field: "matrix".into(),
                reason: format!("Row {i} contains a non-finite value"),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Column vector normalization; an all-zero column keeps denominator 1.
fn vector_normalize(matrix: &[Vec<f64>], n_criteria: usize) -> Vec<Vec<f64>> {
    let norms: Vec<f64> = (0..n_criteria)
        .map(|j| {
            let ss: f64 = matrix.iter().map(|row| row[j] * row[j]).sum();
            let norm = ss.sqrt();
            if norm == 0.0 {
                1.0
            } else {
                norm
            }
        })
        .collect();
    matrix
        .iter()
        .map(|row| row.iter().zip(&norms).map(|(v, n)| v / n).collect())
        .collect()
}

/// Compute the TOPSIS closeness ranking over a decision matrix.
pub fn calculate_topsis_ranking(
    input: &TopsisInput,
) -> GeoHazardResult<ComputationOutput<TopsisOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let n_criteria = input.criteria.len();
    let beneficial = input
        .beneficial
        .clone()
        .unwrap_or_else(|| vec![true; n_criteria]);

    let weight_sum: f64 = input.weights.iter().sum();
    if (weight_sum - 1.0).abs() > 1e-9 {
        warnings.push(format!(
            "Weights summed to {weight_sum:.6}; renormalized to 1"
        ));
    }
    let weights: Vec<f64> = input.weights.iter().map(|w| w / weight_sum).collect();

    // Normalize, then weight.
    let weighted: Vec<Vec<f64>> = vector_normalize(&input.matrix, n_criteria)
        .into_iter()
        .map(|row| row.iter().zip(&weights).map(|(v, w)| v * w).collect())
        .collect();

    // Ideal and anti-ideal per column.
    let mut ideal = vec![0.0; n_criteria];
    let mut anti_ideal = vec![0.0; n_criteria];
    for j in 0..n_criteria {
        let column = weighted.iter().map(|row| row[j]);
        let max = column.clone().fold(f64::NEG_INFINITY, f64::max);
        let min = column.fold(f64::INFINITY, f64::min);
        if beneficial[j] {
            ideal[j] = max;
            anti_ideal[j] = min;
        } else {
            ideal[j] = min;
            anti_ideal[j] = max;
        }
    }

    let euclidean = |row: &[f64], point: &[f64]| -> f64 {
        row.iter()
            .zip(point)
            .map(|(v, p)| (v - p) * (v - p))
            .sum::<f64>()
            .sqrt()
    };

    let mut scored: Vec<(usize, f64, f64, f64)> = weighted
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let d_ideal = euclidean(row, &ideal);
            let d_anti = euclidean(row, &anti_ideal);
            // Both separations 0: denominator becomes 1, closeness 0.
            let denominator = if d_ideal + d_anti == 0.0 {
                1.0
            } else {
                d_ideal + d_anti
            };
            (i, d_anti / denominator, d_ideal, d_anti)
        })
        .collect();

    // Stable sort keeps input order on ties.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let rankings: Vec<AlternativeScore> = scored
        .into_iter()
        .enumerate()
        .map(|(rank, (i, closeness, d_ideal, d_anti))| AlternativeScore {
            rank: rank + 1,
            alternative: input.alternatives[i].clone(),
            closeness,
            ideal_separation: d_ideal,
            anti_ideal_separation: d_anti,
        })
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "TOPSIS Closeness Ranking",
        &serde_json::json!({
            "alternatives": input.alternatives.len(),
            "criteria": input.criteria,
            "beneficial": beneficial,
        }),
        warnings,
        elapsed,
        TopsisOutput { rankings },
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
