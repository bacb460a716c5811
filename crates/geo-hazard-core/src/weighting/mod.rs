//! Expert-judgment criterion weighting methods.
//!
//! Covers:
//! 1. **AHP** -- pairwise comparison matrix, eigenvector weights, consistency ratio.
//! 2. **Fuzzy AHP** -- Chang's extent analysis over triangular fuzzy numbers.
//! 3. **TOPSIS** -- ranking alternatives by distance to ideal/anti-ideal points.

pub mod ahp;
pub mod fuzzy_ahp;
pub mod topsis;

pub use ahp::{calculate_ahp_weights, AhpOutput, ComparisonMatrixInput, ConsistencyReport};
pub use fuzzy_ahp::{calculate_fuzzy_ahp_weights, FuzzyAhpOutput, Tfn};
pub use topsis::{calculate_topsis_ranking, TopsisInput, TopsisOutput};
