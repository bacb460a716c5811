//! Bivariate statistical factor analysis.
//!
//! Relates each conditioning factor's classes to historical hazard
//! occurrence through one of three methods:
//! 1. **Frequency Ratio** -- hazard area share over class area share.
//! 2. **Information Value** -- log density ratio with a fixed floor.
//! 3. **Certainty Factor** -- clipped conditional-probability contrast.

pub mod analysis;
pub mod susceptibility;

pub use analysis::{
    calculate_factor_scores, BivariateInput, BivariateMethod, BivariateOutput, ClassScore,
    Factor, FactorAnalysis, FactorClass,
};
pub use susceptibility::ClassMembership;
