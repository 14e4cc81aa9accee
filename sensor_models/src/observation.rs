//! Observation models: H matrix, R matrix and h(x) per sensor.
//!
//! # Measurement types supported
//! - **Laser**: z = [px, py], H is the constant 2×4 projection
//! - **Radar**: z = [rho, phi, rho_dot], H is the Jacobian linearised at x̂
//!
//! Models hand out dynamic matrices so the filter update can stay generic
//! over the measurement dimension.

use crate::error::ObservationError;
use crate::laser::{laser_h_matrix, LaserNoise};
use crate::radar::{radar_jacobian, radar_observation, RadarNoise};
use nalgebra::{DMatrix, DVector, Vector4};
use serde::{Deserialize, Serialize};

pub type DMat = DMatrix<f64>;
pub type DVec = DVector<f64>;

/// Trait for a sensor observation model.
pub trait ObservationModel {
    /// Dimension of the measurement vector.
    fn dim(&self) -> usize;
    /// Observation matrix H (linear approx. at `state`)
    fn h_matrix(&self, state: &Vector4<f64>) -> Result<DMat, ObservationError>;
    /// Measurement noise covariance R
    fn r_matrix(&self) -> DMat;
    /// Map state to expected measurement h(x)
    fn apply(&self, state: &Vector4<f64>) -> Result<DVec, ObservationError>;
}

// ---------------------------------------------------------------------------
// Laser
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LaserModel {
    pub noise: LaserNoise,
}

impl LaserModel {
    pub fn new(noise: LaserNoise) -> Self {
        Self { noise }
    }
}

impl ObservationModel for LaserModel {
    fn dim(&self) -> usize {
        2
    }

    fn h_matrix(&self, _state: &Vector4<f64>) -> Result<DMat, ObservationError> {
        let h = laser_h_matrix();
        Ok(DMat::from_column_slice(2, 4, h.as_slice()))
    }

    fn r_matrix(&self) -> DMat {
        let r = self.noise.covariance();
        DMat::from_column_slice(2, 2, r.as_slice())
    }

    fn apply(&self, state: &Vector4<f64>) -> Result<DVec, ObservationError> {
        Ok(DVec::from_vec(vec![state[0], state[1]]))
    }
}

// ---------------------------------------------------------------------------
// Radar
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RadarModel {
    pub noise: RadarNoise,
}

impl RadarModel {
    pub fn new(noise: RadarNoise) -> Self {
        Self { noise }
    }
}

impl ObservationModel for RadarModel {
    fn dim(&self) -> usize {
        3
    }

    fn h_matrix(&self, state: &Vector4<f64>) -> Result<DMat, ObservationError> {
        let hj = radar_jacobian(state)?;
        Ok(DMat::from_column_slice(3, 4, hj.as_slice()))
    }

    fn r_matrix(&self) -> DMat {
        let r = self.noise.covariance();
        DMat::from_column_slice(3, 3, r.as_slice())
    }

    fn apply(&self, state: &Vector4<f64>) -> Result<DVec, ObservationError> {
        let z = radar_observation(state)?;
        Ok(DVec::from_column_slice(z.as_slice()))
    }
}
