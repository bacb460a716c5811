use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoHazardError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for GeoHazardError {
    fn from(e: serde_json::Error) -> Self {
        GeoHazardError::SerializationError(e.to_string())
    }
}
