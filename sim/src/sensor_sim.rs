//! Laser/radar measurement simulator.
//!
//! Generates asynchronous packets with:
//! - Gaussian noise on every measured component
//! - Independent refresh rates and phase offsets per sensor
//! - Ground truth attached to every packet

use crate::target::Target;
use fusion_core::types::{MeasurementPackage, SensorKind, Timestamp, TICKS_PER_SECOND};
use nalgebra::Vector4;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use sensor_models::{
    normalize_angle, LaserModel, LaserNoise, ObservationModel, RadarModel, RadarNoise,
};
use serde::{Deserialize, Serialize};

/// Noise configuration of a simulated sensor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SensorNoise {
    Laser(LaserNoise),
    Radar(RadarNoise),
}

/// One configured sensor in the simulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimSensor {
    pub noise: SensorNoise,
    /// Update rate (Hz)
    pub refresh_rate: f64,
    /// Next scheduled scan time (s)
    pub next_scan_time: f64,
}

impl SimSensor {
    pub fn laser(noise: LaserNoise, refresh_rate: f64, first_scan: f64) -> Self {
        Self {
            noise: SensorNoise::Laser(noise),
            refresh_rate,
            next_scan_time: first_scan,
        }
    }

    pub fn radar(noise: RadarNoise, refresh_rate: f64, first_scan: f64) -> Self {
        Self {
            noise: SensorNoise::Radar(noise),
            refresh_rate,
            next_scan_time: first_scan,
        }
    }

    pub fn kind(&self) -> SensorKind {
        match self.noise {
            SensorNoise::Laser(_) => SensorKind::Laser,
            SensorNoise::Radar(_) => SensorKind::Radar,
        }
    }

    /// Check if this sensor should fire at the current simulation time.
    pub fn should_scan(&self, t: f64) -> bool {
        t >= self.next_scan_time
    }

    /// Advance the schedule by one scan interval.
    pub fn advance_schedule(&mut self) {
        self.next_scan_time += 1.0 / self.refresh_rate;
    }
}

/// Generates measurement packets for a target.
pub struct SensorSimulator {
    pub sensors: Vec<SimSensor>,
    rng: ChaCha8Rng,
}

impl SensorSimulator {
    pub fn new(sensors: Vec<SimSensor>, seed: u64) -> Self {
        Self {
            sensors,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generate the packets of every sensor due at `sim_time`.
    pub fn generate(&mut self, target: &Target, sim_time: f64) -> Vec<MeasurementPackage> {
        let mut packets = Vec::new();
        let truth = target.state;
        let x = Vector4::from(truth);

        for sensor in &mut self.sensors {
            if !sensor.should_scan(sim_time) {
                continue;
            }
            sensor.advance_schedule();
            // Stamped with the step time so truth, measurement and timestamp agree.
            let timestamp = (sim_time * TICKS_PER_SECOND).round() as Timestamp;

            let packet = match &sensor.noise {
                SensorNoise::Laser(noise) => {
                    let Ok(z) = LaserModel::new(noise.clone()).apply(&x) else {
                        continue;
                    };
                    MeasurementPackage::laser(
                        timestamp,
                        z[0] + gaussian(&mut self.rng, noise.px_std),
                        z[1] + gaussian(&mut self.rng, noise.py_std),
                    )
                }
                SensorNoise::Radar(noise) => {
                    // No return from a target sitting on the sensor.
                    let Ok(z) = RadarModel::new(noise.clone()).apply(&x) else {
                        continue;
                    };
                    MeasurementPackage::radar(
                        timestamp,
                        (z[0] + gaussian(&mut self.rng, noise.range_std)).max(0.0),
                        normalize_angle(z[1] + gaussian(&mut self.rng, noise.bearing_std)),
                        z[2] + gaussian(&mut self.rng, noise.range_rate_std),
                    )
                }
            };
            packets.push(packet.with_ground_truth(truth));
        }

        packets.sort_by_key(|p| p.timestamp);
        packets
    }
}

fn gaussian(rng: &mut ChaCha8Rng, std: f64) -> f64 {
    let n: f64 = rng.sample(StandardNormal);
    n * std
}
