//! Radar sensor: noise parameters and the nonlinear polar observation model.
//!
//! # Measurement
//! z = [rho, phi, rho_dot]
//! - rho     = √(px² + py²)
//! - phi     = atan2(py, px)
//! - rho_dot = (px·vx + py·vy) / rho
//!
//! # Jacobian of h(x) at x = [px, py, vx, vy]
//! ```text
//! [ px/ρ                  py/ρ                  0     0    ]
//! [ -py/ρ²                px/ρ²                 0     0    ]
//! [ py(vx·py−vy·px)/ρ³    px(vy·px−vx·py)/ρ³    px/ρ  py/ρ ]
//! ```
//! Both h(x) and the Jacobian are undefined at the sensor origin; they return
//! [`ObservationError::DegenerateRange`] instead of dividing by ~0.

use crate::error::ObservationError;
use nalgebra::{Matrix3, Matrix3x4, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Squared range below which the polar model is considered degenerate.
pub const MIN_RANGE_SQ: f64 = 1e-4;

/// Index of the bearing component inside a radar measurement vector.
pub const BEARING_INDEX: usize = 1;

/// Radar measurement noise (standard deviations).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadarNoise {
    /// Range noise std dev (meters)
    pub range_std: f64,
    /// Bearing noise std dev (radians)
    pub bearing_std: f64,
    /// Range-rate noise std dev (m/s)
    pub range_rate_std: f64,
}

impl Default for RadarNoise {
    fn default() -> Self {
        Self {
            range_std: 0.3,       // R = 0.09
            bearing_std: 0.03,    // R = 0.0009
            range_rate_std: 0.3,  // R = 0.09
        }
    }
}

impl RadarNoise {
    /// Measurement noise covariance R (3×3, diagonal).
    pub fn covariance(&self) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::new(
            self.range_std * self.range_std,
            self.bearing_std * self.bearing_std,
            self.range_rate_std * self.range_rate_std,
        ))
    }
}

fn checked_range_sq(state: &Vector4<f64>) -> Result<f64, ObservationError> {
    let rho2 = state[0] * state[0] + state[1] * state[1];
    if !rho2.is_finite() || rho2 < MIN_RANGE_SQ {
        return Err(ObservationError::DegenerateRange { range_sq: rho2 });
    }
    Ok(rho2)
}

/// Evaluate the radar Jacobian at `state`.
pub fn radar_jacobian(state: &Vector4<f64>) -> Result<Matrix3x4<f64>, ObservationError> {
    let (px, py, vx, vy) = (state[0], state[1], state[2], state[3]);
    let rho2 = checked_range_sq(state)?;
    let rho = rho2.sqrt();
    let rho3 = rho2 * rho;

    #[rustfmt::skip]
    let hj = Matrix3x4::new(
        px / rho,                             py / rho,                             0.0,      0.0,
        -py / rho2,                           px / rho2,                            0.0,      0.0,
        py * (vx * py - vy * px) / rho3,      px * (vy * px - vx * py) / rho3,      px / rho, py / rho,
    );
    Ok(hj)
}

/// Nonlinear radar observation h(x) = [rho, phi, rho_dot].
pub fn radar_observation(state: &Vector4<f64>) -> Result<Vector3<f64>, ObservationError> {
    let (px, py, vx, vy) = (state[0], state[1], state[2], state[3]);
    let rho = checked_range_sq(state)?.sqrt();
    Ok(Vector3::new(rho, py.atan2(px), (px * vx + py * vy) / rho))
}

/// Wrap an angle into (−π, π], returning the minimal-magnitude equivalent.
pub fn normalize_angle(angle: f64) -> f64 {
    PI - (PI - angle).rem_euclid(TAU)
}

/// Convert polar [rho, phi] to cartesian [x, y] relative to the sensor.
pub fn polar_to_cartesian(rho: f64, phi: f64) -> (f64, f64) {
    (rho * phi.cos(), rho * phi.sin())
}
