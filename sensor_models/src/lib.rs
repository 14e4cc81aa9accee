//! `sensor_models` — Laser/radar observation models, polar conversion, Jacobians.

pub mod error;
pub mod laser;
pub mod observation;
pub mod radar;

pub use error::ObservationError;
pub use laser::{laser_h_matrix, LaserNoise};
pub use observation::{DMat, DVec, LaserModel, ObservationModel, RadarModel};
pub use radar::{
    normalize_angle, polar_to_cartesian, radar_jacobian, radar_observation, RadarNoise,
    BEARING_INDEX, MIN_RANGE_SQ,
};
