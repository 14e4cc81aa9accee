//! Fundamental types used across the entire workspace.

use crate::error::FusionError;
use nalgebra::{Matrix4, Vector4};
use sensor_models::polar_to_cartesian;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use sensor_models::{DMat, DVec};

// ---------------------------------------------------------------------------
// Scalar type: use f64 throughout for numerical precision in Kalman filter.
// ---------------------------------------------------------------------------

/// 4-DOF state vector: [px, py, vx, vy]
pub type StateVec = Vector4<f64>;

/// 4×4 state covariance matrix
pub type StateCov = Matrix4<f64>;

/// Sensor timestamps are integer microseconds.
pub type Timestamp = i64;

/// Sensor clock ticks per second.
pub const TICKS_PER_SECOND: f64 = 1_000_000.0;

// ---------------------------------------------------------------------------
// Sensor tag
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Laser,
    Radar,
}

impl SensorKind {
    /// Number of raw measurement components this sensor reports.
    pub fn measurement_dim(self) -> usize {
        match self {
            SensorKind::Laser => 2,
            SensorKind::Radar => 3,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Laser => write!(f, "laser"),
            SensorKind::Radar => write!(f, "radar"),
        }
    }
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// The actual observation value carried by a [`MeasurementPackage`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MeasurementValue {
    /// Cartesian position from the laser (meters)
    Laser { px: f64, py: f64 },
    /// Polar reading from the radar (meters, radians, m/s)
    Radar { rho: f64, phi: f64, rho_dot: f64 },
}

/// One timestamped sensor reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPackage {
    /// Sensor clock, microseconds
    pub timestamp: Timestamp,
    pub value: MeasurementValue,
    /// True [px, py, vx, vy] when the source provides it (logs, simulator)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<[f64; 4]>,
}

impl MeasurementPackage {
    pub fn laser(timestamp: Timestamp, px: f64, py: f64) -> Self {
        Self {
            timestamp,
            value: MeasurementValue::Laser { px, py },
            ground_truth: None,
        }
    }

    pub fn radar(timestamp: Timestamp, rho: f64, phi: f64, rho_dot: f64) -> Self {
        Self {
            timestamp,
            value: MeasurementValue::Radar { rho, phi, rho_dot },
            ground_truth: None,
        }
    }

    /// Build a package from an untyped component list, rejecting a
    /// component count that does not match the sensor or a NaN/Inf component.
    pub fn from_raw(
        sensor: SensorKind,
        timestamp: Timestamp,
        raw: &[f64],
    ) -> Result<Self, FusionError> {
        let expected = sensor.measurement_dim();
        if raw.len() != expected {
            return Err(FusionError::DimensionMismatch {
                context: format!("{sensor} measurement"),
                expected,
                actual: raw.len(),
            });
        }
        if !raw.iter().all(|v| v.is_finite()) {
            return Err(FusionError::NonFiniteMeasurement { sensor });
        }
        Ok(match sensor {
            SensorKind::Laser => Self::laser(timestamp, raw[0], raw[1]),
            SensorKind::Radar => Self::radar(timestamp, raw[0], raw[1], raw[2]),
        })
    }

    pub fn with_ground_truth(mut self, truth: [f64; 4]) -> Self {
        self.ground_truth = Some(truth);
        self
    }

    pub fn sensor(&self) -> SensorKind {
        match self.value {
            MeasurementValue::Laser { .. } => SensorKind::Laser,
            MeasurementValue::Radar { .. } => SensorKind::Radar,
        }
    }

    /// Whether every measured component is a finite number.
    pub fn is_finite(&self) -> bool {
        match self.value {
            MeasurementValue::Laser { px, py } => px.is_finite() && py.is_finite(),
            MeasurementValue::Radar { rho, phi, rho_dot } => {
                rho.is_finite() && phi.is_finite() && rho_dot.is_finite()
            }
        }
    }

    /// Raw measurement vector z in the sensor's own space.
    pub fn raw(&self) -> DVec {
        match self.value {
            MeasurementValue::Laser { px, py } => DVec::from_vec(vec![px, py]),
            MeasurementValue::Radar { rho, phi, rho_dot } => {
                DVec::from_vec(vec![rho, phi, rho_dot])
            }
        }
    }

    /// Return the measured position as cartesian (x, y).
    pub fn to_cartesian_2d(&self) -> (f64, f64) {
        match self.value {
            MeasurementValue::Laser { px, py } => (px, py),
            MeasurementValue::Radar { rho, phi, .. } => polar_to_cartesian(rho, phi),
        }
    }
}

// ---------------------------------------------------------------------------
// Estimate: posterior snapshot handed to consumers
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Timestamp of the last time update
    pub timestamp: Timestamp,
    pub state: StateVec,
    pub cov: StateCov,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_wrong_component_count() {
        let err = MeasurementPackage::from_raw(SensorKind::Radar, 0, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            FusionError::DimensionMismatch { expected: 3, actual: 2, .. }
        ));
        assert!(MeasurementPackage::from_raw(SensorKind::Laser, 0, &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn from_raw_rejects_non_finite_components() {
        let err = MeasurementPackage::from_raw(SensorKind::Laser, 0, &[f64::INFINITY, 1.0])
            .unwrap_err();
        assert_eq!(err, FusionError::NonFiniteMeasurement { sensor: SensorKind::Laser });
        assert!(!err.is_recoverable());
        assert!(MeasurementPackage::from_raw(SensorKind::Radar, 0, &[1.0, f64::NAN, 0.0]).is_err());
        assert!(!MeasurementPackage::radar(0, 1.0, 0.0, f64::NEG_INFINITY).is_finite());
        assert!(MeasurementPackage::laser(0, 1.0, 2.0).is_finite());
    }

    #[test]
    fn from_raw_builds_typed_values() {
        let p = MeasurementPackage::from_raw(SensorKind::Radar, 7, &[1.0, 0.5, -0.2]).unwrap();
        assert_eq!(p.sensor(), SensorKind::Radar);
        assert_eq!(p.timestamp, 7);
        assert_eq!(p.raw().len(), 3);
        assert_eq!(p.raw()[2], -0.2);
    }

    #[test]
    fn package_serializes_without_empty_ground_truth() {
        let p = MeasurementPackage::laser(100, 1.0, 2.0);
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("ground_truth"));
        let back: MeasurementPackage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
