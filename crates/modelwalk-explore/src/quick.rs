//! Backtracking walk that remembers how it first reached each unexplored
//! `(state, action)` pair and replays that path after a reset.

use std::collections::HashMap;

use log::debug;
use modelwalk_model::{ActionSet, Harness, Sequence, Transition};
use rand::Rng;

use crate::config::WalkConfig;
use crate::walk::{Step, Walk, WalkCore, WalkError};

/// An action seen enabled in a state but not yet tried there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unexplored<S> {
    pub state: S,
    pub action: usize,
}

/// Transitions `0..depth` of a session sequence.
///
/// The sequence is append-only, so a path stays valid while the session it
/// was taken from keeps growing.
#[derive(Debug, Clone)]
pub struct Path<S> {
    sequence: Sequence<S>,
    depth: usize,
}

impl<S: Clone> Path<S> {
    pub fn new(sequence: Sequence<S>, depth: usize) -> Self {
        Self { sequence, depth }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn steps(&self) -> Vec<Transition<S>> {
        self.sequence.prefix(self.depth)
    }
}

#[derive(Debug)]
struct Remembered<S> {
    path: Path<S>,
    /// Name of the unexplored action, kept alongside its index.
    name: String,
}

#[derive(Debug)]
struct Goal<S> {
    target: Unexplored<S>,
    name: String,
    steps: Vec<Transition<S>>,
    next: usize,
}

/// Backtracking ("quick") walk.
///
/// Explores untried actions first. Every pair seen enabled but untried is
/// remembered with the first path that reached it; when a reset happens the
/// walk may pick one of those pairs and replay its path by action name.
/// A replay that does not reproduce (non-deterministic model) is abandoned
/// and followed by a reset.
pub struct QuickWalk<H: Harness> {
    core: WalkCore<H>,
    max_depth: usize,
    max_unexplored: usize,
    backtrack_probability: f64,
    unexplored: HashMap<Unexplored<H::State>, Remembered<H::State>>,
    /// Keys of `unexplored` in a deterministic order for random selection.
    order: Vec<Unexplored<H::State>>,
    tried: HashMap<H::State, ActionSet>,
    goal: Option<Goal<H::State>>,
    dropped: usize,
    abandoned: usize,
}

impl<H: Harness> QuickWalk<H> {
    pub fn new(harness: H, config: &WalkConfig) -> Result<Self, WalkError> {
        Ok(Self {
            core: WalkCore::new(harness, config)?,
            max_depth: config.max_depth,
            max_unexplored: config.max_unexplored,
            backtrack_probability: config.backtrack_probability,
            unexplored: HashMap::new(),
            order: Vec::new(),
            tried: HashMap::new(),
            goal: None,
            dropped: 0,
            abandoned: 0,
        })
    }

    pub fn into_harness(self) -> H {
        self.core.into_harness()
    }

    /// Number of remembered unexplored pairs.
    pub fn unexplored_len(&self) -> usize {
        self.unexplored.len()
    }

    pub fn path_to(&self, pair: &Unexplored<H::State>) -> Option<&Path<H::State>> {
        self.unexplored.get(pair).map(|r| &r.path)
    }

    pub fn is_replaying(&self) -> bool {
        self.goal.is_some()
    }

    /// Pairs not remembered because the memory was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Replays given up because the model did not reproduce the path.
    pub fn abandoned(&self) -> usize {
        self.abandoned
    }

    fn explore(&mut self) -> Result<Step, WalkError> {
        let state = self.core.harness().current_state();
        let tried = self.tried.get(&state).cloned().unwrap_or_default();
        let mut untried = ActionSet::full(self.core.harness().num_actions()).difference(&tried);

        while let Some(action) = self.core.pick(&untried) {
            untried.remove(action);
            self.mark_tried(&state, action);
            if self.core.harness_mut().do_action(action)? {
                self.remember_outstanding()?;
                return Ok(Step::Action(action));
            }
        }

        match self.core.random_action()? {
            Some(action) => {
                self.remember_outstanding()?;
                Ok(Step::Action(action))
            }
            None => self.backtrack("no enabled action"),
        }
    }

    fn replay(&mut self, mut goal: Goal<H::State>) -> Result<Step, WalkError> {
        let state = self.core.harness().current_state();

        if let Some(expected) = goal.steps.get(goal.next) {
            if state != expected.start {
                return self.abandon(&goal, "start state differs");
            }
            let Some(action) = self.core.harness().action_index(&expected.action) else {
                return self.abandon(&goal, "unknown action name");
            };
            let end = expected.end.clone();
            if !self.core.harness_mut().do_action(action)? {
                return self.abandon(&goal, "action not taken");
            }
            if self.core.harness().current_state() != end {
                return self.abandon(&goal, "end state differs");
            }
            goal.next += 1;
            self.goal = Some(goal);
            return Ok(Step::Action(action));
        }

        if state != goal.target.state {
            return self.abandon(&goal, "goal state not reached");
        }
        if self.core.harness().action_index(&goal.name) != Some(goal.target.action) {
            return self.abandon(&goal, "action index and name disagree");
        }
        let action = goal.target.action;
        self.mark_tried(&state, action);
        if !self.core.harness_mut().do_action(action)? {
            return self.abandon(&goal, "goal action not taken");
        }
        self.remember_outstanding()?;
        Ok(Step::Action(action))
    }

    fn abandon(&mut self, goal: &Goal<H::State>, why: &str) -> Result<Step, WalkError> {
        debug!(
            "abandoning replay toward ({}, {}) at step {}: {why}",
            goal.target.state, goal.name, goal.next
        );
        self.abandoned += 1;
        self.backtrack("replay diverged")
    }

    /// Reset, then maybe switch to replaying toward a remembered pair.
    fn backtrack(&mut self, reason: &str) -> Result<Step, WalkError> {
        self.goal = None;
        self.core.reset(reason, true);
        self.remember_outstanding()?;

        let p = self.backtrack_probability;
        if !self.order.is_empty() && self.core.roll(p) {
            let k = self.core.rng_mut().gen_range(0..self.order.len());
            let target = self.order.swap_remove(k);
            if let Some(remembered) = self.unexplored.remove(&target) {
                debug!(
                    "replaying {} steps toward ({}, {})",
                    remembered.path.depth(),
                    target.state,
                    remembered.name
                );
                self.goal = Some(Goal {
                    steps: remembered.path.steps(),
                    target,
                    name: remembered.name,
                    next: 0,
                });
            }
        }
        Ok(Step::Reset)
    }

    fn mark_tried(&mut self, state: &H::State, action: usize) {
        self.tried.entry(state.clone()).or_default().insert(action);
        let key = Unexplored {
            state: state.clone(),
            action,
        };
        if self.unexplored.remove(&key).is_some() {
            self.order.retain(|k| k != &key);
        }
    }

    /// Remember every enabled, untried action of the current state together
    /// with the path that reached it.
    fn remember_outstanding(&mut self) -> Result<(), WalkError> {
        let sequence = self.core.harness().sequence();
        let depth = sequence.len();
        if depth >= self.max_depth {
            return Ok(());
        }

        let state = self.core.harness().current_state();
        let enabled = self.core.harness_mut().enabled_set()?;
        let fresh = match self.tried.get(&state) {
            Some(tried) => enabled.difference(tried),
            None => enabled,
        };

        for action in fresh.iter() {
            let key = Unexplored {
                state: state.clone(),
                action,
            };
            if self.unexplored.contains_key(&key) {
                continue;
            }
            if self.unexplored.len() >= self.max_unexplored {
                self.dropped += 1;
                continue;
            }
            let name = self
                .core
                .harness()
                .action_name(action)
                .unwrap_or_default()
                .to_string();
            self.unexplored.insert(
                key.clone(),
                Remembered {
                    path: Path::new(sequence.clone(), depth),
                    name,
                },
            );
            self.order.push(key);
        }
        Ok(())
    }
}

impl<H: Harness> Walk for QuickWalk<H> {
    type Harness = H;

    fn core(&self) -> &WalkCore<H> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WalkCore<H> {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "quick"
    }

    fn step(&mut self) -> Result<Step, WalkError> {
        if self.core.harness().sequence().len() >= self.max_depth {
            return self.backtrack("max depth reached");
        }
        if let Some(goal) = self.goal.take() {
            return self.replay(goal);
        }
        // Spontaneous resets are only rolled between replays.
        let p = self.core.reset_probability();
        if self.core.roll(p) {
            return self.backtrack("random reset");
        }
        self.explore()
    }
}
