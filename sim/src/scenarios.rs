//! Scenario definitions.
//!
//! Each scenario is a named target trajectory plus a sensor suite.
//! All scenarios are deterministic given the same seed.

use crate::{
    sensor_sim::{SensorSimulator, SimSensor},
    target::{MotionSpec, Target},
};
use fusion_core::types::MeasurementPackage;
use sensor_models::{LaserNoise, RadarNoise};
use serde::{Deserialize, Serialize};

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// Straight line, laser and radar interleaved
    Straight,
    /// Figure-eight built from two opposite constant turns
    Figure8,
    /// Accelerate, then a long constant turn
    Turning,
    /// Straight line seen by the laser only
    LaserOnly,
    /// Figure-eight seen by the radar only
    RadarOnly,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub duration: f64, // seconds
    pub sim_dt: f64,   // simulation step (s)
    pub target: Target,
    pub sensors: Vec<SimSensor>,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Straight => Self::straight(seed),
            ScenarioKind::Figure8 => Self::figure8(seed),
            ScenarioKind::Turning => Self::turning(seed),
            ScenarioKind::LaserOnly => Self::laser_only(seed),
            ScenarioKind::RadarOnly => Self::radar_only(seed),
        }
    }

    /// Run the scenario and return every packet in timestamp order.
    pub fn generate(&self) -> Vec<MeasurementPackage> {
        let mut target = self.target.clone();
        let mut sim = SensorSimulator::new(self.sensors.clone(), self.seed);
        let mut packets = Vec::new();

        let steps = (self.duration / self.sim_dt).round() as u64;
        for i in 0..=steps {
            let t = i as f64 * self.sim_dt;
            packets.extend(sim.generate(&target, t));
            target.step(t, self.sim_dt);
        }
        packets
    }

    fn straight(seed: u64) -> Self {
        Scenario {
            name: "straight".into(),
            seed,
            duration: 20.0,
            sim_dt: 0.01,
            target: Target::new([-10.0, 4.0], [2.0, 0.5], MotionSpec::ConstantVelocity),
            sensors: both_sensors(),
        }
    }

    fn figure8(seed: u64) -> Self {
        Scenario {
            name: "figure8".into(),
            seed,
            duration: 25.0,
            sim_dt: 0.01,
            target: figure8_target(),
            sensors: both_sensors(),
        }
    }

    fn turning(seed: u64) -> Self {
        let motion = MotionSpec::Segmented {
            segments: vec![
                (0.0, Box::new(MotionSpec::ConstantAccel { ax: 0.5, ay: 0.0 })),
                (5.0, Box::new(MotionSpec::ConstantTurn { omega: 0.3 })),
            ],
        };
        Scenario {
            name: "turning".into(),
            seed,
            duration: 30.0,
            sim_dt: 0.01,
            target: Target::new([2.0, -8.0], [1.0, 0.0], motion),
            sensors: both_sensors(),
        }
    }

    fn laser_only(seed: u64) -> Self {
        Scenario {
            name: "laser_only".into(),
            seed,
            sensors: vec![SimSensor::laser(LaserNoise::default(), 20.0, 0.0)],
            ..Self::straight(seed)
        }
    }

    fn radar_only(seed: u64) -> Self {
        Scenario {
            name: "radar_only".into(),
            seed,
            sensors: vec![SimSensor::radar(RadarNoise::default(), 20.0, 0.0)],
            ..Self::figure8(seed)
        }
    }
}

// ---------------------------------------------------------------------------
// Builder helpers
// ---------------------------------------------------------------------------

/// Laser and radar at 20 Hz each, offset so packets alternate.
fn both_sensors() -> Vec<SimSensor> {
    vec![
        SimSensor::laser(LaserNoise::default(), 20.0, 0.0),
        SimSensor::radar(RadarNoise::default(), 20.0, 0.025),
    ]
}

/// Loops around (8, 5) and (8, -5), well clear of the sensor origin.
fn figure8_target() -> Target {
    let omega = 0.5;
    let one_loop = std::f64::consts::TAU / omega;
    Target::new(
        [8.0, 0.0],
        [2.5, 0.0],
        MotionSpec::Segmented {
            segments: vec![
                (0.0, Box::new(MotionSpec::ConstantTurn { omega: -omega })),
                (one_loop, Box::new(MotionSpec::ConstantTurn { omega })),
            ],
        },
    )
}
