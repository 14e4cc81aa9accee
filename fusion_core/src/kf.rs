//! Kalman filter core: predict, linear update and EKF update.
//!
//! # Design choices
//! - The filter owns x, P, F and Q. The measurement matrix H and noise R are
//!   sensor-dependent and passed in on every update call.
//! - State and covariance are fixed-size; the update algebra runs on dynamic
//!   matrices so one code path serves 2D laser and 3D radar measurements.
//! - A failed update never touches x or P.
//!
//! ## State vector
//! x = [px, py, vx, vy]ᵀ  (4-dimensional)
//!
//! ## CV Transition model
//! F = I₄ + dt * [[0₂ I₂]; [0₂ 0₂]]
//!
//! ## Process noise Q (discrete white noise acceleration, per axis)
//! Q_pos = σ²·dt⁴/4,  Q_pos_vel = σ²·dt³/2,  Q_vel = σ²·dt²

use crate::error::FusionError;
use crate::types::{DMat, DVec, StateCov, StateVec};
use nalgebra::Matrix4;
use sensor_models::{normalize_angle, radar_observation, BEARING_INDEX};

const STATE_DIM: usize = 4;

/// Result of a KF update step, exposed for diagnostics.
#[derive(Clone, Debug)]
pub struct KfUpdateResult {
    /// Innovation ν = z − h(x) (bearing already wrapped for radar)
    pub innovation: DVec,
    /// Innovation covariance S = H·P·Hᵀ + R
    pub innovation_cov: DMat,
    /// Kalman gain K
    pub kalman_gain: DMat,
    /// Normalized innovation squared νᵀ·S⁻¹·ν
    pub nis: f64,
}

// ---------------------------------------------------------------------------
// Model matrices
// ---------------------------------------------------------------------------

/// Build state transition matrix F for timestep dt.
pub fn transition_matrix(dt: f64) -> Matrix4<f64> {
    let mut f = Matrix4::<f64>::identity();
    // position += velocity * dt
    f[(0, 2)] = dt;
    f[(1, 3)] = dt;
    f
}

/// Build process noise matrix Q for timestep dt from per-axis acceleration
/// variances.
pub fn process_noise(dt: f64, noise_ax: f64, noise_ay: f64) -> Matrix4<f64> {
    let dt2 = dt * dt;
    let dt3 = dt2 * dt;
    let dt4 = dt3 * dt;

    let mut qm = Matrix4::<f64>::zeros();
    for (i, q) in [noise_ax, noise_ay].into_iter().enumerate() {
        qm[(i, i)] = q * dt4 / 4.0;
        qm[(i + 2, i + 2)] = q * dt2;
        qm[(i, i + 2)] = q * dt3 / 2.0;
        qm[(i + 2, i)] = q * dt3 / 2.0;
    }
    qm
}

fn symmetrize(p: &StateCov) -> StateCov {
    (p + p.transpose()) * 0.5
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Single-target Kalman filter over the constant-velocity state.
#[derive(Clone, Debug, PartialEq)]
pub struct KalmanFilter {
    x: StateVec,
    p: StateCov,
    f: Matrix4<f64>,
    q: Matrix4<f64>,
}

impl KalmanFilter {
    pub fn init(x: StateVec, p: StateCov, f: Matrix4<f64>, q: Matrix4<f64>) -> Self {
        Self { x, p, f, q }
    }

    /// Overwrite the whole belief. Treated as an intentional reset.
    pub fn reinit(&mut self, x: StateVec, p: StateCov, f: Matrix4<f64>, q: Matrix4<f64>) {
        *self = Self::init(x, p, f, q);
    }

    pub fn state(&self) -> &StateVec {
        &self.x
    }

    pub fn covariance(&self) -> &StateCov {
        &self.p
    }

    pub fn transition(&self) -> &Matrix4<f64> {
        &self.f
    }

    pub fn process_noise(&self) -> &Matrix4<f64> {
        &self.q
    }

    /// Write `dt` into the time-dependent entries of F.
    pub fn set_transition(&mut self, dt: f64) {
        self.f[(0, 2)] = dt;
        self.f[(1, 3)] = dt;
    }

    pub fn set_process_noise(&mut self, q: Matrix4<f64>) {
        self.q = q;
    }

    /// x ← F·x,  P ← F·P·Fᵀ + Q.
    pub fn predict(&mut self) {
        self.x = self.f * self.x;
        self.p = symmetrize(&(self.f * self.p * self.f.transpose() + self.q));
    }

    /// Linear update: innovation ν = z − H·x.
    pub fn update(&mut self, z: &DVec, h: &DMat, r: &DMat) -> Result<KfUpdateResult, FusionError> {
        check_dims(z, h, r)?;
        let x_dyn = DVec::from_column_slice(self.x.as_slice());
        let innovation = z - h * x_dyn;
        self.apply_innovation(innovation, h, r)
    }

    /// Radar update: innovation ν = z − h(x) with the nonlinear polar model
    /// and `h` the Jacobian evaluated at the current state.
    pub fn update_ekf(
        &mut self,
        z: &DVec,
        h: &DMat,
        r: &DMat,
    ) -> Result<KfUpdateResult, FusionError> {
        check_dims(z, h, r)?;
        if z.len() != 3 {
            return Err(FusionError::DimensionMismatch {
                context: "radar measurement".to_string(),
                expected: 3,
                actual: z.len(),
            });
        }
        let hx = radar_observation(&self.x)?;
        let mut innovation = DVec::from_fn(3, |i, _| z[i] - hx[i]);
        innovation[BEARING_INDEX] = normalize_angle(innovation[BEARING_INDEX]);
        self.apply_innovation(innovation, h, r)
    }

    /// Gain and posterior shared by both update paths.
    fn apply_innovation(
        &mut self,
        innovation: DVec,
        h: &DMat,
        r: &DMat,
    ) -> Result<KfUpdateResult, FusionError> {
        let p_dyn = DMat::from_column_slice(STATE_DIM, STATE_DIM, self.p.as_slice());

        // Innovation covariance: S = H·P·Hᵀ + R
        let ht = h.transpose();
        let s = h * &p_dyn * &ht + r;

        // Kalman gain: K = P·Hᵀ·S⁻¹  (LU for numerical stability)
        let dim = s.nrows();
        let s_inv = s
            .clone()
            .lu()
            .try_inverse()
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .ok_or(FusionError::SingularInnovation { dim })?;
        let k = &p_dyn * &ht * &s_inv;

        // Updated state: x' = x + K·ν
        let state_update = &k * &innovation;
        let new_state = StateVec::from_fn(|i, _| self.x[i] + state_update[i]);

        // Updated covariance: Joseph form P' = (I−KH)·P·(I−KH)ᵀ + K·R·Kᵀ
        let i_kh = DMat::identity(STATE_DIM, STATE_DIM) - &k * h;
        let new_p_dyn = &i_kh * &p_dyn * i_kh.transpose() + &k * r * k.transpose();
        let new_cov = symmetrize(&StateCov::from_fn(|i, j| new_p_dyn[(i, j)]));

        if !new_state.iter().chain(new_cov.iter()).all(|v| v.is_finite()) {
            return Err(FusionError::NumericalInstability {
                context: "posterior state or covariance is not finite".to_string(),
            });
        }

        let nis = innovation.dot(&(&s_inv * &innovation));
        self.x = new_state;
        self.p = new_cov;

        Ok(KfUpdateResult {
            innovation,
            innovation_cov: s,
            kalman_gain: k,
            nis,
        })
    }
}

fn check_dims(z: &DVec, h: &DMat, r: &DMat) -> Result<(), FusionError> {
    let m = z.len();
    let mismatch = |context: &str, expected: usize, actual: usize| {
        Err(FusionError::DimensionMismatch {
            context: context.to_string(),
            expected,
            actual,
        })
    };
    if h.ncols() != STATE_DIM {
        return mismatch("H columns", STATE_DIM, h.ncols());
    }
    if h.nrows() != m {
        return mismatch("H rows", m, h.nrows());
    }
    if r.nrows() != m || r.ncols() != m {
        return mismatch("R size", m, r.nrows().max(r.ncols()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector4;
    use sensor_models::{radar_jacobian, LaserModel, ObservationModel, RadarModel};
    use std::f64::consts::{PI, TAU};

    fn filter_at(x: StateVec, p: StateCov) -> KalmanFilter {
        KalmanFilter::init(x, p, transition_matrix(1.0), Matrix4::zeros())
    }

    fn trace(p: &StateCov) -> f64 {
        (0..4).map(|i| p[(i, i)]).sum()
    }

    #[test]
    fn predict_constant_velocity() {
        let mut kf = filter_at(Vector4::new(0.0, 0.0, 10.0, -2.0), StateCov::identity());
        kf.set_transition(0.5);
        kf.predict();
        assert_abs_diff_eq!(kf.state()[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kf.state()[1], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kf.state()[2], 10.0, epsilon = 1e-12);
    }

    #[test]
    fn predict_with_zero_dt_and_zero_noise_is_noop() {
        let x = Vector4::new(1.0, 2.0, 3.0, 4.0);
        let p = StateCov::from_diagonal(&Vector4::new(1.0, 2.0, 3.0, 4.0));
        let mut kf = filter_at(x, p);
        kf.set_transition(0.0);
        kf.set_process_noise(process_noise(0.0, 9.0, 9.0));
        kf.predict();
        assert_eq!(kf.state(), &x);
        assert_eq!(kf.covariance(), &p);
    }

    #[test]
    fn two_half_steps_compose_to_one_step() {
        let x = Vector4::new(1.0, -1.0, 2.0, 0.5);
        let p = StateCov::identity();
        let dt = 0.2;

        let mut once = filter_at(x, p);
        once.set_transition(dt);
        once.set_process_noise(process_noise(dt, 9.0, 9.0));
        once.predict();

        let mut twice = filter_at(x, p);
        twice.set_transition(dt / 2.0);
        twice.set_process_noise(process_noise(dt / 2.0, 9.0, 9.0));
        twice.predict();
        twice.predict();

        for i in 0..4 {
            assert_abs_diff_eq!(once.state()[i], twice.state()[i], epsilon = 1e-12);
        }
        // Covariances differ only through the discretised process noise.
        let q = process_noise(dt, 9.0, 9.0);
        for r in 0..4 {
            for c in 0..4 {
                let diff = (once.covariance()[(r, c)] - twice.covariance()[(r, c)]).abs();
                assert!(diff <= q[(r, c)].abs() + 1e-12, "P[{r},{c}] diff {diff}");
            }
        }
    }

    #[test]
    fn process_noise_structure() {
        let q = process_noise(0.1, 9.0, 4.0);
        assert_abs_diff_eq!(q[(0, 0)], 9.0 * 1e-4 / 4.0, epsilon = 1e-15);
        assert_abs_diff_eq!(q[(1, 1)], 4.0 * 1e-4 / 4.0, epsilon = 1e-15);
        assert_abs_diff_eq!(q[(0, 2)], 9.0 * 1e-3 / 2.0, epsilon = 1e-15);
        assert_abs_diff_eq!(q[(3, 1)], 4.0 * 1e-3 / 2.0, epsilon = 1e-15);
        assert_abs_diff_eq!(q[(2, 2)], 9.0 * 1e-2, epsilon = 1e-15);
        assert_eq!(q[(0, 1)], 0.0);
        assert_eq!(q[(0, 3)], 0.0);
        assert_eq!(q, q.transpose());
    }

    #[test]
    fn update_with_perfect_measurement_keeps_state_and_shrinks_cov() {
        let x = Vector4::new(100.0, 50.0, 5.0, 2.0);
        let p = StateCov::identity() * 100.0;
        let mut kf = filter_at(x, p);

        let laser = LaserModel::default();
        let h = laser.h_matrix(&x).unwrap();
        let r = laser.r_matrix();
        let z = DVec::from_vec(vec![100.0, 50.0]);

        let res = kf.update(&z, &h, &r).unwrap();
        assert_eq!(kf.state(), &x);
        assert_abs_diff_eq!(res.nis, 0.0, epsilon = 1e-12);
        assert!(trace(kf.covariance()) < trace(&p), "update should reduce uncertainty");
        assert!(kf.covariance()[(0, 0)] < p[(0, 0)]);
        assert!(kf.covariance()[(1, 1)] < p[(1, 1)]);
        assert_eq!(kf.covariance(), &kf.covariance().transpose());
    }

    #[test]
    fn update_moves_state_toward_measurement() {
        let mut kf = filter_at(Vector4::new(0.0, 0.0, 0.0, 0.0), StateCov::identity());
        let laser = LaserModel::default();
        let h = laser.h_matrix(kf.state()).unwrap();
        let z = DVec::from_vec(vec![1.0, -1.0]);
        let res = kf.update(&z, &h, &laser.r_matrix()).unwrap();
        assert!(kf.state()[0] > 0.0 && kf.state()[0] < 1.0);
        assert!(kf.state()[1] < 0.0 && kf.state()[1] > -1.0);
        assert_eq!(res.kalman_gain.shape(), (4, 2));
        assert_eq!(res.innovation_cov.shape(), (2, 2));
    }

    #[test]
    fn singular_innovation_is_rejected_without_mutation() {
        let x = Vector4::new(1.0, 1.0, 0.0, 0.0);
        let mut kf = filter_at(x, StateCov::zeros());
        let h = LaserModel::default().h_matrix(&x).unwrap();
        let r = DMat::zeros(2, 2);
        let err = kf.update(&DVec::from_vec(vec![2.0, 2.0]), &h, &r).unwrap_err();
        assert_eq!(err, FusionError::SingularInnovation { dim: 2 });
        assert_eq!(kf.state(), &x);
        assert_eq!(kf.covariance(), &StateCov::zeros());
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let mut kf = filter_at(Vector4::new(1.0, 1.0, 0.0, 0.0), StateCov::identity());
        let h = LaserModel::default().h_matrix(kf.state()).unwrap();
        let r = RadarModel::default().r_matrix();
        let err = kf.update(&DVec::from_vec(vec![1.0, 1.0]), &h, &r).unwrap_err();
        assert!(matches!(err, FusionError::DimensionMismatch { .. }));

        let laser_r = LaserModel::default().r_matrix();
        let err = kf
            .update_ekf(&DVec::from_vec(vec![1.0, 1.0]), &h, &laser_r)
            .unwrap_err();
        assert!(matches!(err, FusionError::DimensionMismatch { expected: 3, .. }));
    }

    #[test]
    fn ekf_update_wraps_bearing_innovation() {
        // Predicted bearing −3.1, measured bearing 3.2 (same direction, across ±π)
        let rho = 5.0;
        let x = Vector4::new(rho * (-3.1f64).cos(), rho * (-3.1f64).sin(), 0.0, 0.0);
        let mut kf = filter_at(x, StateCov::identity());
        let radar = RadarModel::default();
        let h = radar.h_matrix(&x).unwrap();
        let z = DVec::from_vec(vec![rho, 3.2, 0.0]);

        let res = kf.update_ekf(&z, &h, &radar.r_matrix()).unwrap();
        let wrapped = res.innovation[1];
        assert!(wrapped > -PI && wrapped <= PI);
        assert_abs_diff_eq!(wrapped, 6.3 - TAU, epsilon = 1e-9);
        // A ~0.017 rad correction at 5 m moves the position by centimetres, not meters.
        assert!((kf.state() - x).norm() < 0.2);
    }

    #[test]
    fn ekf_update_toward_range_measurement() {
        let x = Vector4::new(3.0, 4.0, 0.0, 0.0);
        let mut kf = filter_at(x, StateCov::identity());
        let radar = RadarModel::default();
        let h = DMat::from_column_slice(3, 4, radar_jacobian(&x).unwrap().as_slice());
        let z = DVec::from_vec(vec![5.5, (4.0f64).atan2(3.0), 0.0]);
        kf.update_ekf(&z, &h, &radar.r_matrix()).unwrap();
        let range = kf.state()[0].hypot(kf.state()[1]);
        assert!(range > 5.0 && range < 5.5, "range {range}");
    }

    #[test]
    fn ekf_update_at_origin_is_degenerate() {
        let x = Vector4::new(0.0, 0.0, 1.0, 1.0);
        let mut kf = filter_at(x, StateCov::identity());
        let h = DMat::zeros(3, 4);
        let r = RadarModel::default().r_matrix();
        let err = kf
            .update_ekf(&DVec::from_vec(vec![1.0, 0.0, 0.0]), &h, &r)
            .unwrap_err();
        assert!(matches!(err, FusionError::Observation(_)));
        assert_eq!(kf.state(), &x);
    }

    #[test]
    fn non_finite_measurement_is_not_committed() {
        let x = Vector4::new(1.0, 1.0, 0.0, 0.0);
        let mut kf = filter_at(x, StateCov::identity());
        let laser = LaserModel::default();
        let h = laser.h_matrix(&x).unwrap();
        let err = kf
            .update(&DVec::from_vec(vec![f64::NAN, 1.0]), &h, &laser.r_matrix())
            .unwrap_err();
        assert!(matches!(err, FusionError::NumericalInstability { .. }));
        assert_eq!(kf.state(), &x);
    }

    #[test]
    fn reinit_overwrites_belief() {
        let mut kf = filter_at(Vector4::new(1.0, 1.0, 1.0, 1.0), StateCov::identity());
        let x = Vector4::new(-5.0, 2.0, 0.0, 0.0);
        kf.reinit(x, StateCov::identity() * 3.0, transition_matrix(0.1), Matrix4::zeros());
        assert_eq!(kf.state(), &x);
        assert_eq!(kf.covariance()[(2, 2)], 3.0);
        assert_eq!(kf.transition()[(0, 2)], 0.1);
        assert_eq!(kf.process_noise(), &Matrix4::zeros());
    }
}
