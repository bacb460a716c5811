//! Model validation against observed hazard occurrence.
//!
//! Covers:
//! 1. **Threshold metrics** -- confusion counts, accuracy, precision,
//!    recall, specificity, F1, Cohen's kappa.
//! 2. **AUC-ROC** -- trapezoidal integration with bootstrap confidence
//!    intervals and a qualitative performance tier.
//! 3. **Spatial cross-validation** -- checkerboard block fold generation.

pub mod engine;
pub mod spatial_cv;

pub use engine::{
    evaluate_predictions, BootstrapCi, ConfusionCounts, PerformanceTier, ValidationInput,
    ValidationReport,
};
pub use spatial_cv::{generate_spatial_folds, Fold, SpatialCvInput, SpatialCvOutput, SpatialPoint};
