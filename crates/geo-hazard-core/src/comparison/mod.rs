//! Multi-model comparison: per-model validation, pairwise significance
//! tests, and AUC ranking.

pub mod comparator;
pub mod pairwise;

pub use comparator::{
    ComparatorConfig, ComparisonReport, ModelComparator, ModelMetrics, ModelSummaryRow,
};
pub use pairwise::PairwiseTestResult;
