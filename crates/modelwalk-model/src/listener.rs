//! Observer protocol for walks.
//!
//! Listeners see every reset, guard evaluation, action and failure but never
//! steer the walk. The only influence they have is aborting generation by
//! returning an error from [`Listener::on_failure`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::{info, warn};
use serde::Serialize;

use crate::transition::Transition;

/// A test failure captured while driving the model.
#[derive(Debug)]
pub struct FailureRecord<S> {
    /// Action that was running (or the pseudo-action that detected the failure).
    pub action: String,
    /// State before the failing action started.
    pub state: S,
    /// Transitions of the current session up to the failure.
    pub sequence: Vec<Transition<S>>,
    pub error: anyhow::Error,
}

impl<S: fmt::Display> fmt::Display for FailureRecord<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failure in `{}` from state {} after {} steps: {:#}",
            self.action,
            self.state,
            self.sequence.len(),
            self.error
        )
    }
}

/// Receives walk events. All methods default to doing nothing.
pub trait Listener<S> {
    fn on_reset(&mut self, _reason: &str, _testing: bool) {}

    fn on_guard(&mut self, _state: &S, _action: usize, _enabled: bool, _weight: u32) {}

    fn on_action_starting(&mut self, _state: &S, _action: usize, _name: &str) {}

    fn on_transition_done(&mut self, _action: usize, _transition: &Transition<S>) {}

    /// Returning an error aborts generation.
    fn on_failure(&mut self, _failure: &FailureRecord<S>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Shared listeners: the walk keeps one handle to query, the model holds another.
impl<S, L: Listener<S> + ?Sized> Listener<S> for Rc<RefCell<L>> {
    fn on_reset(&mut self, reason: &str, testing: bool) {
        self.borrow_mut().on_reset(reason, testing);
    }

    fn on_guard(&mut self, state: &S, action: usize, enabled: bool, weight: u32) {
        self.borrow_mut().on_guard(state, action, enabled, weight);
    }

    fn on_action_starting(&mut self, state: &S, action: usize, name: &str) {
        self.borrow_mut().on_action_starting(state, action, name);
    }

    fn on_transition_done(&mut self, action: usize, transition: &Transition<S>) {
        self.borrow_mut().on_transition_done(action, transition);
    }

    fn on_failure(&mut self, failure: &FailureRecord<S>) -> anyhow::Result<()> {
        self.borrow_mut().on_failure(failure)
    }
}

/// Aborts generation on the first failure.
#[derive(Debug, Default)]
pub struct StopOnFailure;

impl<S: fmt::Display> Listener<S> for StopOnFailure {
    fn on_failure(&mut self, failure: &FailureRecord<S>) -> anyhow::Result<()> {
        anyhow::bail!("{failure}")
    }
}

/// Serialisable summary of one failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureSummary {
    pub action: String,
    pub state: String,
    pub steps: Vec<String>,
    pub message: String,
}

/// Collects failures so callers can inspect them once generation ends.
#[derive(Debug, Default)]
pub struct FailureLog {
    failures: Vec<FailureSummary>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> &[FailureSummary] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<S: fmt::Display> Listener<S> for FailureLog {
    fn on_failure(&mut self, failure: &FailureRecord<S>) -> anyhow::Result<()> {
        warn!("{failure}");
        self.failures.push(FailureSummary {
            action: failure.action.clone(),
            state: failure.state.to_string(),
            steps: failure.sequence.iter().map(|t| t.to_string()).collect(),
            message: format!("{:#}", failure.error),
        });
        Ok(())
    }
}

/// Logs resets and transitions at info level.
#[derive(Debug, Default)]
pub struct VerboseListener;

impl<S: fmt::Display> Listener<S> for VerboseListener {
    fn on_reset(&mut self, reason: &str, testing: bool) {
        info!("reset ({reason}, testing={testing})");
    }

    fn on_transition_done(&mut self, action: usize, transition: &Transition<S>) {
        info!("done {transition} [action {action}]");
    }

    fn on_failure(&mut self, failure: &FailureRecord<S>) -> anyhow::Result<()> {
        warn!("{failure}");
        Ok(())
    }
}
