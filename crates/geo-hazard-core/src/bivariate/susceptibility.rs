//! Susceptibility index over a location's class memberships.
//!
//! Frequency ratio and information value scores combine additively; the
//! certainty factor combines through its pairwise rule, folded strictly in
//! the caller-supplied factor order. The fold is not guaranteed
//! associative once signs mix, so the order callers pass is preserved
//! exactly.

use serde::{Deserialize, Serialize};

use super::analysis::{BivariateMethod, BivariateOutput};

/// A location's class within one factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMembership {
    pub factor: String,
    pub class_name: String,
}

/// Pairwise certainty factor combination.
///
/// Both non-negative: a + b - ab. Both negative: a + b + ab.
/// Mixed signs: (a + b) / (1 - min(|a|, |b|)), 0 when that denominator is 0.
pub(crate) fn combine_certainty_factors(a: f64, b: f64) -> f64 {
    if a >= 0.0 && b >= 0.0 {
        a + b - a * b
    } else if a < 0.0 && b < 0.0 {
        a + b + a * b
    } else {
        let denominator = 1.0 - a.abs().min(b.abs());
        if denominator == 0.0 {
            0.0
        } else {
            (a + b) / denominator
        }
    }
}

impl BivariateOutput {
    /// Susceptibility index of one location from its class memberships.
    ///
    /// Looks up one class score per membership and folds them with the
    /// method's combination rule. A factor or class absent from the model
    /// is skipped, never penalized.
    pub fn susceptibility_index(&self, memberships: &[ClassMembership]) -> f64 {
        let scores = memberships.iter().filter_map(|membership| {
            self.factors
                .iter()
                .find(|f| f.factor == membership.factor)?
                .classes
                .iter()
                .find(|c| c.class_name == membership.class_name)
                .map(|c| c.score)
        });

        match self.method {
            BivariateMethod::FrequencyRatio | BivariateMethod::InformationValue => scores.sum(),
            BivariateMethod::CertaintyFactor => {
                scores.reduce(combine_certainty_factors).unwrap_or(0.0)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
