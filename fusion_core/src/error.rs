//! Error taxonomy for the fusion filter.
//!
//! Everything except malformed input ([`FusionError::DimensionMismatch`],
//! [`FusionError::NonFiniteMeasurement`]) is recoverable: the orchestrator
//! skips the measurement update and keeps the predicted state.

use crate::types::SensorKind;
use sensor_models::ObservationError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FusionError {
    /// Observation model could not be evaluated (e.g. target at sensor origin)
    #[error("observation model failed: {0}")]
    Observation(#[from] ObservationError),

    /// Innovation covariance S = H·P·Hᵀ + R could not be inverted
    #[error("innovation covariance ({dim}×{dim}) is singular")]
    SingularInnovation { dim: usize },

    /// The update would have written NaN/Inf into x or P
    #[error("numerical instability: {context}")]
    NumericalInstability { context: String },

    /// A measurement component is NaN or infinite; the input is malformed
    #[error("{sensor} measurement has a non-finite component")]
    NonFiniteMeasurement { sensor: SensorKind },

    /// Mismatched vector/matrix dimensions; the input is malformed
    #[error("dimension mismatch for {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },
}

/// Failure to load a [`crate::fusion::FusionConfig`] from disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl FusionError {
    /// Whether the filter can carry on after this error by skipping the update.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            FusionError::DimensionMismatch { .. } | FusionError::NonFiniteMeasurement { .. }
        )
    }
}
