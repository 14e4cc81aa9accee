//! `fusion_core` — Laser/radar sensor fusion with an Extended Kalman Filter.
//!
//! # Module layout
//! - [`types`]   — Fundamental types (state vectors, measurement packages)
//! - [`error`]   — Error taxonomy
//! - [`kf`]      — Kalman filter core (predict / linear update / EKF update)
//! - [`fusion`]  — Fusion orchestrator: init, dt bookkeeping, sensor dispatch
//! - [`metrics`] — RMSE against ground truth

pub mod error;
pub mod fusion;
pub mod kf;
pub mod metrics;
pub mod types;

pub use error::{ConfigError, FusionError};
pub use fusion::{FilterState, FusionConfig, FusionEkf, StepOutcome};
pub use kf::{KalmanFilter, KfUpdateResult};
pub use metrics::{RmseAccumulator, RmseReport};
pub use types::{
    Estimate, MeasurementPackage, MeasurementValue, SensorKind, StateCov, StateVec, Timestamp,
};
