//! Checkerboard spatial cross-validation folds.
//!
//! Random splits leak information between train and test sets when hazard
//! observations are spatially autocorrelated. Grouping nearby locations
//! into grid blocks and assigning whole blocks to folds keeps neighbours
//! on the same side of every split.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::GeoHazardError;
use crate::types::{with_metadata, ComputationOutput};
use crate::GeoHazardResult;

/// Keeps bounding-box-edge coordinates inside the last grid bin.
const EXTENT_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// A hazard observation location in projected coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpatialPoint {
    pub x: f64,
    pub y: f64,
}

/// Input for spatial fold generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialCvInput {
    pub points: Vec<SpatialPoint>,
    #[serde(default = "default_n_splits")]
    pub n_splits: u32,
    #[serde(default = "default_grid_dim")]
    pub grid_rows: u32,
    #[serde(default = "default_grid_dim")]
    pub grid_cols: u32,
}

fn default_n_splits() -> u32 {
    5
}

fn default_grid_dim() -> u32 {
    10
}

/// One cross-validation fold over point indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Output of spatial fold generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialCvOutput {
    /// Grid block id per point, in input order.
    pub block_assignments: Vec<usize>,
    pub folds: Vec<Fold>,
    pub requested_splits: u32,
    /// May be fewer than requested when folds come up empty.
    pub generated_splits: u32,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &SpatialCvInput) -> GeoHazardResult<()> {
    if input.points.is_empty() {
        return Err(GeoHazardError::InsufficientData(
            "At least one point is required.".into(),
        ));
    }
    if input
        .points
        .iter()
        .any(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(GeoHazardError::InvalidInput {
            field: "points".into(),
            reason: "Coordinates must be finite".into(),
        });
    }
    if input.n_splits < 2 {
        return Err(GeoHazardError::InvalidInput {
            field: "n_splits".into(),
            reason: format!("At least 2 splits are required, got {}", input.n_splits),
        });
    }
    if input.grid_rows == 0 || input.grid_cols == 0 {
        return Err(GeoHazardError::InvalidInput {
            field: "grid".into(),
            reason: "Grid dimensions must be positive".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Block assignment
// ---------------------------------------------------------------------------

/// Map each point to a grid block over the point-set bounding box.
fn assign_blocks(points: &[SpatialPoint], rows: u32, cols: u32) -> Vec<usize> {
    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    // The epsilon keeps normalized coordinates strictly below 1 so points
    // on the max edge land in the last bin, not past it.
    let extent_x = (max_x - min_x) + EXTENT_EPSILON;
    let extent_y = (max_y - min_y) + EXTENT_EPSILON;

    points
        .iter()
        .map(|p| {
            let col = ((p.x - min_x) / extent_x * cols as f64).floor() as usize;
            let row = ((p.y - min_y) / extent_y * rows as f64).floor() as usize;
            row * cols as usize + col
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Generate checkerboard spatial cross-validation folds.
///
/// Fold `i` tests the points whose block id is congruent to `i` modulo
/// `n_splits`. Folds with an empty train or test side are skipped with a
/// warning; callers must tolerate fewer folds than requested.
pub fn generate_spatial_folds(
    input: &SpatialCvInput,
) -> GeoHazardResult<ComputationOutput<SpatialCvOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let block_assignments = assign_blocks(&input.points, input.grid_rows, input.grid_cols);

    let mut folds: Vec<Fold> = Vec::with_capacity(input.n_splits as usize);
    for fold_index in 0..input.n_splits as usize {
        let mut train_indices = Vec::new();
        let mut test_indices = Vec::new();
        for (point_index, &block) in block_assignments.iter().enumerate() {
            if block % input.n_splits as usize == fold_index {
                test_indices.push(point_index);
            } else {
                train_indices.push(point_index);
            }
        }
        if test_indices.is_empty() || train_indices.is_empty() {
            warnings.push(format!(
                "Fold {fold_index} skipped: {} side is empty",
                if test_indices.is_empty() { "test" } else { "train" }
            ));
            continue;
        }
        folds.push(Fold {
            train_indices,
            test_indices,
        });
    }

    let generated_splits = folds.len() as u32;
    let output = SpatialCvOutput {
        block_assignments,
        folds,
        requested_splits: input.n_splits,
        generated_splits,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Checkerboard Spatial Cross-Validation",
        &serde_json::json!({
            "n_points": input.points.len(),
            "n_splits": input.n_splits,
            "grid": [input.grid_rows, input.grid_cols],
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
