//! Laser (lidar) sensor: linear position-only observation.

use nalgebra::{Matrix2, Matrix2x4, Vector2};
use serde::{Deserialize, Serialize};

/// Laser measurement noise (standard deviations, meters).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaserNoise {
    pub px_std: f64,
    pub py_std: f64,
}

impl Default for LaserNoise {
    fn default() -> Self {
        Self {
            px_std: 0.15, // R = 0.0225
            py_std: 0.15,
        }
    }
}

impl LaserNoise {
    /// Measurement noise covariance R (2×2, diagonal).
    pub fn covariance(&self) -> Matrix2<f64> {
        Matrix2::from_diagonal(&Vector2::new(
            self.px_std * self.px_std,
            self.py_std * self.py_std,
        ))
    }
}

/// Fixed laser measurement matrix: z = [px, py].
pub fn laser_h_matrix() -> Matrix2x4<f64> {
    #[rustfmt::skip]
    let h = Matrix2x4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
    );
    h
}
