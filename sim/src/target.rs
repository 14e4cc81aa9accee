//! Target trajectory models and state propagation.
//!
//! The target has a 4-DOF true state [px,py,vx,vy] and a `MotionSpec`
//! describing how it moves. The simulator steps it forward in time.

use serde::{Deserialize, Serialize};

/// Describes target motion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Constant velocity: no acceleration.
    ConstantVelocity,
    /// Constant-turn-rate on XY plane. `omega` = yaw rate (rad/s).
    ConstantTurn { omega: f64 },
    /// Constant acceleration model. `ax, ay` in m/s².
    ConstantAccel { ax: f64, ay: f64 },
    /// Segmented: switch motion model at given sim times.
    /// `segments` is sorted by time ascending: [(t_start, MotionSpec), ...].
    /// The active spec is the last one whose t_start <= current_t.
    Segmented {
        segments: Vec<(f64, Box<MotionSpec>)>,
    },
}

/// The simulated target with ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
    /// True state [px, py, vx, vy]
    pub state: [f64; 4],
    pub motion: MotionSpec,
}

impl Target {
    pub fn new(pos: [f64; 2], vel: [f64; 2], motion: MotionSpec) -> Self {
        Self {
            state: [pos[0], pos[1], vel[0], vel[1]],
            motion,
        }
    }

    /// Propagate true state by `dt` seconds according to motion spec.
    pub fn step(&mut self, t: f64, dt: f64) {
        self.state = propagate(&self.motion, self.state, t, dt);
    }

    pub fn pos_2d(&self) -> (f64, f64) {
        (self.state[0], self.state[1])
    }
}

fn propagate(motion: &MotionSpec, mut s: [f64; 4], t: f64, dt: f64) -> [f64; 4] {
    match motion {
        MotionSpec::ConstantVelocity => {
            s[0] += s[2] * dt;
            s[1] += s[3] * dt;
        }
        MotionSpec::ConstantTurn { omega } => {
            let v = s[2].hypot(s[3]);
            let heading = s[3].atan2(s[2]);
            let new_heading = heading + omega * dt;
            s[0] += v * heading.cos() * dt;
            s[1] += v * heading.sin() * dt;
            s[2] = v * new_heading.cos();
            s[3] = v * new_heading.sin();
        }
        MotionSpec::ConstantAccel { ax, ay } => {
            s[0] += s[2] * dt + 0.5 * ax * dt * dt;
            s[1] += s[3] * dt + 0.5 * ay * dt * dt;
            s[2] += ax * dt;
            s[3] += ay * dt;
        }
        MotionSpec::Segmented { segments } => {
            let active = segments.iter().filter(|(t_start, _)| *t_start <= t).last();
            // Before first segment: CV
            let spec = active.map_or(&MotionSpec::ConstantVelocity, |(_, spec)| spec.as_ref());
            s = propagate(spec, s, t, dt);
        }
    }
    s
}
