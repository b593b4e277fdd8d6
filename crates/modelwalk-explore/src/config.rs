use serde::{Deserialize, Serialize};

use crate::rng::DEFAULT_SEED;
use crate::walk::WalkError;

/// Configuration shared by the walk algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// RNG seed for reproducibility.
    pub seed: u64,
    /// Chance of a spontaneous reset before each step, `0 <= p < 1`. The
    /// quick walk does not roll it while replaying toward a goal.
    pub reset_probability: f64,
    /// Session length after which the quick walk forces a reset.
    pub max_depth: usize,
    /// Capacity of the quick walk's unexplored-pair memory.
    pub max_unexplored: usize,
    /// Chance that a quick-walk reset replays toward a remembered pair.
    pub backtrack_probability: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            reset_probability: 0.05,
            max_depth: 20,
            max_unexplored: 1000,
            backtrack_probability: 0.5,
        }
    }
}

impl WalkConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_reset_probability(mut self, p: f64) -> Self {
        self.reset_probability = p;
        self
    }

    pub fn validate(&self) -> Result<(), WalkError> {
        if !(0.0..1.0).contains(&self.reset_probability) {
            return Err(WalkError::Config(format!(
                "reset_probability must be in [0, 1), got {}",
                self.reset_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.backtrack_probability) {
            return Err(WalkError::Config(format!(
                "backtrack_probability must be in [0, 1], got {}",
                self.backtrack_probability
            )));
        }
        if self.max_depth == 0 {
            return Err(WalkError::Config("max_depth must be positive".to_string()));
        }
        if self.max_unexplored == 0 {
            return Err(WalkError::Config(
                "max_unexplored must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
