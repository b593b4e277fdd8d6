use modelwalk_model::Harness;

use crate::config::WalkConfig;
use crate::walk::{Step, Walk, WalkCore, WalkError};

/// Coverage-greedy walk.
///
/// Prefers actions that were seen enabled in the current state but never
/// taken from it, falling back to a uniform random choice once the state has
/// no outstanding work. Converges on full transition coverage faster than
/// [`RandomWalk`](crate::RandomWalk) and degrades to it afterwards.
pub struct GreedyWalk<H: Harness> {
    core: WalkCore<H>,
}

impl<H: Harness> GreedyWalk<H> {
    pub fn new(harness: H, config: &WalkConfig) -> Result<Self, WalkError> {
        let mut core = WalkCore::new(harness, config)?;
        core.graph();
        Ok(Self { core })
    }

    pub fn into_harness(self) -> H {
        self.core.into_harness()
    }
}

impl<H: Harness> Walk for GreedyWalk<H> {
    type Harness = H;

    fn core(&self) -> &WalkCore<H> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WalkCore<H> {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "greedy"
    }

    fn step(&mut self) -> Result<Step, WalkError> {
        self.core.greedy_step(true)
    }
}
