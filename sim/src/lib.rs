//! `sim` — Scenario simulator, measurement logs, replay.

pub mod log_format;
pub mod replay;
pub mod scenarios;
pub mod sensor_sim;
pub mod target;

pub use log_format::{read_log, write_estimate, write_log, LogError};
pub use replay::{load_replay, save_replay, ReplayLog};
pub use scenarios::{Scenario, ScenarioKind};
pub use sensor_sim::{SensorSimulator, SimSensor};
pub use target::{MotionSpec, Target};
