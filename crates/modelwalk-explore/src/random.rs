use modelwalk_model::Harness;

use crate::config::WalkConfig;
use crate::walk::{Step, Walk, WalkCore, WalkError};

/// Uniform random walk.
///
/// Each step first rolls for a spontaneous reset; otherwise actions are
/// drawn without replacement until one is enabled and succeeds. A state
/// with no possible action forces a reset, so the walk never gets stuck.
pub struct RandomWalk<H: Harness> {
    core: WalkCore<H>,
}

impl<H: Harness> RandomWalk<H> {
    pub fn new(harness: H, config: &WalkConfig) -> Result<Self, WalkError> {
        Ok(Self {
            core: WalkCore::new(harness, config)?,
        })
    }

    pub fn into_harness(self) -> H {
        self.core.into_harness()
    }
}

impl<H: Harness> Walk for RandomWalk<H> {
    type Harness = H;

    fn core(&self) -> &WalkCore<H> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WalkCore<H> {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "random"
    }

    fn step(&mut self) -> Result<Step, WalkError> {
        let p = self.core.reset_probability();
        if self.core.roll(p) {
            return Ok(self.core.reset("random reset", true));
        }
        match self.core.random_action()? {
            Some(action) => Ok(Step::Action(action)),
            None => Ok(self.core.reset("no enabled action", true)),
        }
    }
}
