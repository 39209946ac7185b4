//! Simulation configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of trials per simulation
    pub iterations: usize,

    /// Random seed for reproducibility (None = random)
    pub seed: Option<u64>,

    /// Attempt cap per step, as a multiple of its expected attempts
    pub retry_multiplier: f64,

    /// Trials per parallel batch; each batch owns one RNG
    pub batch_size: usize,

    /// Worker threads (None = one per core)
    pub workers: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            seed: None,
            retry_multiplier: 2.0,
            batch_size: 250,
            workers: None,
        }
    }
}

impl SimConfig {
    /// Few trials, for quick what-if checks
    pub fn quick() -> Self {
        Self {
            iterations: 200,
            ..Default::default()
        }
    }

    /// Many trials, for final numbers
    pub fn thorough() -> Self {
        Self {
            iterations: 10_000,
            batch_size: 500,
            ..Default::default()
        }
    }

    /// Reproducible run
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Number of batches needed for `iterations` trials
    pub fn batch_count(&self, iterations: usize) -> usize {
        let size = self.batch_size.max(1);
        iterations.div_ceil(size)
    }
}
