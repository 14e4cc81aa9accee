//! Accuracy metrics: componentwise RMSE of estimates against ground truth.

use crate::types::StateVec;
use serde::{Deserialize, Serialize};

/// Accumulated squared errors for RMSE over [px, py, vx, vy].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RmseAccumulator {
    /// Number of (estimate, ground truth) pairs seen
    pub n_samples: u64,
    /// Per-component sum of squared errors
    pub sum_sq_err: [f64; 4],
}

/// Serializable RMSE summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RmseReport {
    pub n_samples: u64,
    pub px: f64,
    pub py: f64,
    pub vx: f64,
    pub vy: f64,
}

impl RmseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one estimate / ground-truth pair.
    pub fn accumulate(&mut self, estimate: &StateVec, ground_truth: &[f64; 4]) {
        for (i, truth) in ground_truth.iter().enumerate() {
            let err = estimate[i] - truth;
            self.sum_sq_err[i] += err * err;
        }
        self.n_samples += 1;
    }

    /// Root-mean-square error per component; `None` before any sample.
    pub fn rmse(&self) -> Option<StateVec> {
        if self.n_samples == 0 {
            return None;
        }
        let n = self.n_samples as f64;
        Some(StateVec::from_fn(|i, _| (self.sum_sq_err[i] / n).sqrt()))
    }

    pub fn report(&self) -> Option<RmseReport> {
        self.rmse().map(|r| RmseReport {
            n_samples: self.n_samples,
            px: r[0],
            py: r[1],
            vx: r[2],
            vy: r[3],
        })
    }
}
