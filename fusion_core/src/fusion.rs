//! Fusion orchestrator: one EKF fed by asynchronous laser and radar packets.
//!
//! # Processing steps per packet
//! 1. Drop the packet if its sensor is disabled
//! 2. Uninitialized: seed x and P from the packet, remember its timestamp, stop
//! 3. Tracking: dt from the previous timestamp; rebuild F and Q; predict
//! 4. Laser → linear update with the fixed H. Radar → Jacobian at the
//!    predicted state, then the EKF update
//! 5. Recoverable faults skip the update and keep the predicted state

use crate::{
    error::{ConfigError, FusionError},
    kf::{process_noise, transition_matrix, KalmanFilter, KfUpdateResult},
    types::{
        Estimate, MeasurementPackage, MeasurementValue, SensorKind, StateCov, StateVec,
        Timestamp, TICKS_PER_SECOND,
    },
};
use nalgebra::{Matrix4, Vector4};
use sensor_models::{
    polar_to_cartesian, LaserModel, LaserNoise, ObservationModel, RadarModel, RadarNoise,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Calibration constants of the fusion filter, fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub laser_noise: LaserNoise,
    pub radar_noise: RadarNoise,
    /// Acceleration noise variance along x (m²/s⁴)
    pub noise_ax: f64,
    /// Acceleration noise variance along y (m²/s⁴)
    pub noise_ay: f64,
    /// Initial position variance (m²)
    pub initial_position_var: f64,
    /// Initial velocity variance ((m/s)²). Large: velocity is unobserved at init.
    pub initial_velocity_var: f64,
    pub use_laser: bool,
    pub use_radar: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            laser_noise: LaserNoise::default(),
            radar_noise: RadarNoise::default(),
            noise_ax: 9.0,
            noise_ay: 9.0,
            initial_position_var: 1.0,
            initial_velocity_var: 1000.0,
            use_laser: true,
            use_radar: true,
        }
    }
}

impl FusionConfig {
    /// Load a config from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let variances = [
            ("noise_ax", self.noise_ax),
            ("noise_ay", self.noise_ay),
            ("initial_position_var", self.initial_position_var),
            ("initial_velocity_var", self.initial_velocity_var),
        ];
        for (name, v) in variances {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be ≥ 0, got {v}")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle of the filter. There is no way back to `Uninitialized` except
/// an explicit [`FusionEkf::reset`].
#[derive(Clone, Debug, Default)]
pub enum FilterState {
    #[default]
    Uninitialized,
    Tracking {
        kf: KalmanFilter,
        /// Latest timestamp the filter has been predicted to
        previous_timestamp: Timestamp,
    },
}

/// What happened to one packet.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// Sensor disabled in the config; packet dropped
    Ignored { sensor: SensorKind },
    /// First packet: state seeded, no predict/update
    Initialized { sensor: SensorKind },
    Updated {
        sensor: SensorKind,
        /// Elapsed time used for the prediction (seconds, 0 if skipped)
        dt: f64,
        nis: f64,
    },
    /// Packet unusable before initialization; the filter stays uninitialized
    Rejected {
        sensor: SensorKind,
        reason: FusionError,
    },
    /// Prediction applied, measurement update skipped
    UpdateSkipped {
        sensor: SensorKind,
        dt: f64,
        reason: FusionError,
    },
}

/// Laser/radar fusion EKF.
#[derive(Clone, Debug)]
pub struct FusionEkf {
    config: FusionConfig,
    laser: LaserModel,
    radar: RadarModel,
    state: FilterState,
}

impl Default for FusionEkf {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

impl FusionEkf {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            laser: LaserModel::new(config.laser_noise.clone()),
            radar: RadarModel::new(config.radar_noise.clone()),
            config,
            state: FilterState::Uninitialized,
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.state
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, FilterState::Tracking { .. })
    }

    pub fn filter(&self) -> Option<&KalmanFilter> {
        match &self.state {
            FilterState::Uninitialized => None,
            FilterState::Tracking { kf, .. } => Some(kf),
        }
    }

    /// Posterior state vector, once initialized.
    pub fn state(&self) -> Option<&StateVec> {
        self.filter().map(KalmanFilter::state)
    }

    /// Posterior covariance, once initialized.
    pub fn covariance(&self) -> Option<&StateCov> {
        self.filter().map(KalmanFilter::covariance)
    }

    pub fn estimate(&self) -> Option<Estimate> {
        match &self.state {
            FilterState::Uninitialized => None,
            FilterState::Tracking {
                kf,
                previous_timestamp,
            } => Some(Estimate {
                timestamp: *previous_timestamp,
                state: *kf.state(),
                cov: *kf.covariance(),
            }),
        }
    }

    /// Forget everything; the next accepted packet initializes again.
    pub fn reset(&mut self) {
        self.state = FilterState::Uninitialized;
    }

    pub fn set_sensor_enabled(&mut self, sensor: SensorKind, enabled: bool) {
        match sensor {
            SensorKind::Laser => self.config.use_laser = enabled,
            SensorKind::Radar => self.config.use_radar = enabled,
        }
    }

    pub fn sensor_enabled(&self, sensor: SensorKind) -> bool {
        match sensor {
            SensorKind::Laser => self.config.use_laser,
            SensorKind::Radar => self.config.use_radar,
        }
    }

    /// Run one predict/update cycle for `pack`.
    pub fn process_measurement(&mut self, pack: &MeasurementPackage) -> StepOutcome {
        let sensor = pack.sensor();
        if !self.sensor_enabled(sensor) {
            return StepOutcome::Ignored { sensor };
        }

        match &mut self.state {
            FilterState::Uninitialized => match initial_filter(&self.config, pack) {
                Ok(kf) => {
                    debug!(
                        %sensor,
                        timestamp = pack.timestamp,
                        state = ?kf.state().as_slice(),
                        "filter initialized"
                    );
                    self.state = FilterState::Tracking {
                        kf,
                        previous_timestamp: pack.timestamp,
                    };
                    StepOutcome::Initialized { sensor }
                }
                Err(reason) => {
                    warn!(%sensor, timestamp = pack.timestamp, %reason, "cannot initialize filter");
                    StepOutcome::Rejected { sensor, reason }
                }
            },
            FilterState::Tracking {
                kf,
                previous_timestamp,
            } => {
                let dt = advance_clock(previous_timestamp, pack.timestamp);
                if dt > 0.0 {
                    kf.set_transition(dt);
                    let q = process_noise(dt, self.config.noise_ax, self.config.noise_ay);
                    kf.set_process_noise(q);
                    kf.predict();
                }

                match measurement_update(kf, &self.laser, &self.radar, pack) {
                    Ok(res) => {
                        debug!(%sensor, dt, nis = res.nis, "measurement update");
                        StepOutcome::Updated {
                            sensor,
                            dt,
                            nis: res.nis,
                        }
                    }
                    Err(reason) => {
                        warn!(
                            %sensor,
                            timestamp = pack.timestamp,
                            %reason,
                            "measurement update skipped"
                        );
                        StepOutcome::UpdateSkipped { sensor, dt, reason }
                    }
                }
            }
        }
    }
}

/// Seed x and P from the first packet. Velocity is unobserved, so it starts
/// at zero with a large variance; radar range-rate is discarded.
fn initial_filter(
    config: &FusionConfig,
    pack: &MeasurementPackage,
) -> Result<KalmanFilter, FusionError> {
    if !pack.is_finite() {
        return Err(FusionError::NonFiniteMeasurement {
            sensor: pack.sensor(),
        });
    }
    let (px, py) = match pack.value {
        MeasurementValue::Laser { px, py } => (px, py),
        MeasurementValue::Radar { rho, phi, .. } => polar_to_cartesian(rho, phi),
    };
    let x = StateVec::new(px, py, 0.0, 0.0);
    let p = StateCov::from_diagonal(&Vector4::new(
        config.initial_position_var,
        config.initial_position_var,
        config.initial_velocity_var,
        config.initial_velocity_var,
    ));
    // F and Q are rebuilt from the real dt before every prediction.
    Ok(KalmanFilter::init(x, p, transition_matrix(1.0), Matrix4::zeros()))
}

/// Elapsed seconds since `previous`, moving `previous` forward. Duplicate,
/// out-of-order or unrepresentable (i64 overflow) gaps yield 0 and leave the
/// reference untouched.
fn advance_clock(previous: &mut Timestamp, now: Timestamp) -> f64 {
    match now.checked_sub(*previous) {
        Some(elapsed) if elapsed >= 0 => {
            *previous = now;
            elapsed as f64 / TICKS_PER_SECOND
        }
        _ => {
            warn!(previous = *previous, now, "out-of-order timestamp, skipping time update");
            0.0
        }
    }
}

fn measurement_update(
    kf: &mut KalmanFilter,
    laser: &LaserModel,
    radar: &RadarModel,
    pack: &MeasurementPackage,
) -> Result<KfUpdateResult, FusionError> {
    let z = pack.raw();
    match pack.value {
        MeasurementValue::Laser { .. } => {
            let h = laser.h_matrix(kf.state())?;
            kf.update(&z, &h, &laser.r_matrix())
        }
        MeasurementValue::Radar { .. } => {
            let hj = radar.h_matrix(kf.state())?;
            kf.update_ekf(&z, &hj, &radar.r_matrix())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
