use modelwalk_explore::rng::DEFAULT_SEED;
use modelwalk_explore::WalkError;
use serde::{Deserialize, Serialize};

/// Clock settings of a [`TimedModel`](crate::TimedModel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimedConfig {
    /// Seed of the clock's random stream, independent of the walk's.
    pub seed: u64,
    /// Chance that a step prefers advancing time over firing a due timeout.
    pub timeout_probability: f64,
}

impl Default for TimedConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            timeout_probability: 0.5,
        }
    }
}

impl TimedConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), WalkError> {
        if !(0.0..=1.0).contains(&self.timeout_probability) {
            return Err(WalkError::Config(format!(
                "timeout_probability must be in [0, 1], got {}",
                self.timeout_probability
            )));
        }
        Ok(())
    }
}
