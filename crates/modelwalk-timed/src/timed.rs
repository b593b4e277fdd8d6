//! Time-aware harness.
//!
//! After every successful action the clock takes one turn: with
//! `timeout_probability` it advances time (clamped so it never passes an
//! armed timeout), otherwise it fires the timeout that is due now. Either
//! branch falls back to the other when it cannot act. A fired timeout
//! disables every action but its bound one, and holds the clock, until that
//! action has run.

use log::debug;
use modelwalk_explore::rng::{stream_rng, CLOCK_STREAM};
use modelwalk_explore::WalkError;
use modelwalk_model::{Harness, Listener, Model, ModelError, Sequence};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::clock::{Clock, ClockBuilder, TimedFsmModel};
use crate::config::TimedConfig;

/// A [`Model`] decorated with simulated time.
pub struct TimedModel<M: TimedFsmModel> {
    inner: Model<M>,
    clock: Clock<M>,
    rng: ChaCha8Rng,
    timeout_probability: f64,
    /// Bound action of a fired timeout, until it runs.
    forced: Option<usize>,
    /// Clock stream parked while a graph is being built.
    parked_rng: Option<ChaCha8Rng>,
}

impl<M: TimedFsmModel> TimedModel<M> {
    pub fn load(model: M, config: &TimedConfig) -> Result<Self, WalkError> {
        config.validate()?;
        let mut inner = Model::load(model)?;

        let mut builder = ClockBuilder::new();
        inner.model().clock(&mut builder);
        let clock = builder.build(inner.model_name(), |name| inner.action_index(name))?;
        inner.set_clock(clock.time_getter());

        debug!(
            "loaded timed model {} with time field `{}` and {} timeouts",
            inner.model_name(),
            clock.time_name(),
            clock.timeouts().len()
        );
        Ok(Self {
            inner,
            clock,
            rng: stream_rng(config.seed, CLOCK_STREAM),
            timeout_probability: config.timeout_probability,
            forced: None,
            parked_rng: None,
        })
    }

    pub fn model(&self) -> &M {
        self.inner.model()
    }

    pub fn into_inner(self) -> M {
        self.inner.into_inner()
    }

    /// Current value of the time field.
    pub fn now(&self) -> i64 {
        self.clock.now(self.inner.model())
    }

    /// Action a fired timeout is waiting on, if any.
    pub fn forced_action(&self) -> Option<usize> {
        self.forced
    }

    fn blocked(&self, index: usize) -> bool {
        matches!(self.forced, Some(f) if f != index)
    }

    fn after_action(&mut self, index: usize) -> Result<(), ModelError> {
        if self.forced == Some(index) {
            self.forced = None;
        }
        let now = self.clock.now(self.inner.model());
        for timeout in self.clock.timeouts() {
            // A re-armed timeout has moved past now and is left alone.
            if timeout.action() == index && timeout.value(self.inner.model()) == now {
                timeout.disarm(self.inner.model_mut());
            }
        }
        self.tick()
    }

    fn tick(&mut self) -> Result<(), ModelError> {
        if self.forced.is_some() {
            return Ok(());
        }
        if self.rng.gen::<f64>() < self.timeout_probability {
            if !self.advance_time()? {
                self.fire_due();
            }
        } else if !self.fire_due() {
            self.advance_time()?;
        }
        Ok(())
    }

    /// Move time forward. False when a due timeout pins the clock.
    fn advance_time(&mut self) -> Result<bool, ModelError> {
        let model = self.inner.model();
        if self.clock.due(model).is_some() {
            return Ok(false);
        }
        let now = self.clock.now(model);
        let mut next = now.saturating_add(model.time_increment(&mut self.rng).max(1));
        if let Some(at) = self.clock.nearest_armed(model) {
            next = next.min(at);
        }

        let before = self.inner.current_state();
        self.clock.set_now(self.inner.model_mut(), next);
        let after = self.inner.current_state();
        debug!("{}: {now} -> {next}", self.clock.time_name());

        if before != after {
            let action = format!("advance {}", self.clock.time_name());
            let error = anyhow::anyhow!(
                "advancing {} from {now} to {next} changed the state from {before} to {after}",
                self.clock.time_name()
            );
            self.inner.report_failure(&action, before, error)?;
        }
        Ok(true)
    }

    /// Fire the timeout due now. False when none is due.
    fn fire_due(&mut self) -> bool {
        let Some(timeout) = self.clock.due(self.inner.model()) else {
            return false;
        };
        debug!(
            "timeout `{}` fired at {}, forcing action {}",
            timeout.name(),
            self.clock.now(self.inner.model()),
            timeout.action()
        );
        self.forced = Some(timeout.action());
        true
    }
}

impl<M: TimedFsmModel> Harness for TimedModel<M> {
    type State = M::State;

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn current_state(&self) -> M::State {
        self.inner.current_state()
    }

    fn reset(&mut self, reason: &str, testing: bool) {
        self.forced = None;
        self.inner.reset(reason, testing);
    }

    fn num_actions(&self) -> usize {
        self.inner.num_actions()
    }

    fn action_name(&self, index: usize) -> Option<&str> {
        self.inner.action_name(index)
    }

    fn action_index(&self, name: &str) -> Option<usize> {
        self.inner.action_index(name)
    }

    fn enabled(&mut self, index: usize) -> Result<u32, ModelError> {
        if self.blocked(index) {
            self.inner.notify_guard(index, 0);
            return Ok(0);
        }
        self.inner.enabled(index)
    }

    fn do_action(&mut self, index: usize) -> Result<bool, ModelError> {
        if self.blocked(index) {
            self.inner.notify_guard(index, 0);
            return Ok(false);
        }
        if !self.inner.do_action(index)? {
            return Ok(false);
        }
        self.after_action(index)?;
        Ok(true)
    }

    fn sequence(&self) -> Sequence<M::State> {
        self.inner.sequence()
    }

    fn history_len(&self) -> usize {
        self.inner.history_len()
    }

    fn add_listener(&mut self, listener: Box<dyn Listener<M::State>>) {
        self.inner.add_listener(listener);
    }

    fn begin_graph_build(&mut self, seed: u64) {
        let graph_rng = stream_rng(seed, CLOCK_STREAM);
        let parked = std::mem::replace(&mut self.rng, graph_rng);
        // Nested builds keep the outermost caller's stream.
        if self.parked_rng.is_none() {
            self.parked_rng = Some(parked);
        }
    }

    fn end_graph_build(&mut self) {
        if let Some(rng) = self.parked_rng.take() {
            self.rng = rng;
        }
    }
}
