pub mod error;
pub mod types;

#[cfg(feature = "weighting")]
pub mod weighting;

#[cfg(feature = "bivariate")]
pub mod bivariate;

#[cfg(feature = "validation")]
pub mod validation;

#[cfg(feature = "comparison")]
pub mod comparison;

pub use error::GeoHazardError;
pub use types::*;

/// Standard result type for all geo-hazard operations
pub type GeoHazardResult<T> = Result<T, GeoHazardError>;
