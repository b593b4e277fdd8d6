//! Coverage metrics observed through the listener protocol.
//!
//! Metrics only count while the model is being tested: resets with
//! `testing == false` (graph construction) pause counting until the next
//! testing reset.

use std::collections::HashSet;
use std::hash::Hash;

use modelwalk_model::{Listener, Transition};

use crate::graph::ExplorationGraph;

/// A coverage measure over a walk.
pub trait CoverageMetric<S>: Listener<S> {
    fn name(&self) -> &str;

    /// Number of distinct items covered so far.
    fn coverage_count(&self) -> usize;

    /// Number of coverable items, or -1 while unknown.
    fn maximum_possible(&self) -> i64;

    /// Covered share in percent, 0 while the maximum is unknown.
    fn percentage(&self) -> f64 {
        match self.maximum_possible() {
            max if max > 0 => 100.0 * self.coverage_count() as f64 / max as f64,
            _ => 0.0,
        }
    }

    /// Forget everything covered so far.
    fn clear(&mut self);

    /// Called exactly once, when graph construction finds a complete graph.
    fn on_graph_complete(&mut self, graph: &ExplorationGraph<S>);
}

/// Distinct actions taken.
#[derive(Debug)]
pub struct ActionCoverage {
    num_actions: usize,
    covered: HashSet<usize>,
    testing: bool,
}

impl ActionCoverage {
    pub fn new(num_actions: usize) -> Self {
        Self {
            num_actions,
            covered: HashSet::new(),
            testing: true,
        }
    }
}

impl<S> Listener<S> for ActionCoverage {
    fn on_reset(&mut self, _reason: &str, testing: bool) {
        self.testing = testing;
    }

    fn on_transition_done(&mut self, action: usize, _transition: &Transition<S>) {
        if self.testing {
            self.covered.insert(action);
        }
    }
}

impl<S> CoverageMetric<S> for ActionCoverage {
    fn name(&self) -> &str {
        "action coverage"
    }

    fn coverage_count(&self) -> usize {
        self.covered.len()
    }

    fn maximum_possible(&self) -> i64 {
        self.num_actions as i64
    }

    fn clear(&mut self) {
        self.covered.clear();
    }

    fn on_graph_complete(&mut self, _graph: &ExplorationGraph<S>) {}
}

/// Distinct states entered or left by a transition.
#[derive(Debug)]
pub struct StateCoverage<S> {
    covered: HashSet<S>,
    maximum: Option<usize>,
    testing: bool,
}

impl<S> StateCoverage<S> {
    pub fn new() -> Self {
        Self {
            covered: HashSet::new(),
            maximum: None,
            testing: true,
        }
    }
}

impl<S> Default for StateCoverage<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Eq + Hash> Listener<S> for StateCoverage<S> {
    fn on_reset(&mut self, _reason: &str, testing: bool) {
        self.testing = testing;
    }

    fn on_transition_done(&mut self, _action: usize, transition: &Transition<S>) {
        if self.testing {
            self.covered.insert(transition.start.clone());
            self.covered.insert(transition.end.clone());
        }
    }
}

impl<S: Clone + Eq + Hash> CoverageMetric<S> for StateCoverage<S> {
    fn name(&self) -> &str {
        "state coverage"
    }

    fn coverage_count(&self) -> usize {
        self.covered.len()
    }

    fn maximum_possible(&self) -> i64 {
        self.maximum.map_or(-1, |m| m as i64)
    }

    fn clear(&mut self) {
        self.covered.clear();
    }

    fn on_graph_complete(&mut self, graph: &ExplorationGraph<S>) {
        self.maximum = Some(graph.num_vertices());
    }
}

/// Distinct `(start, action, end)` transitions.
#[derive(Debug)]
pub struct TransitionCoverage<S> {
    covered: HashSet<Transition<S>>,
    maximum: Option<usize>,
    testing: bool,
}

impl<S> TransitionCoverage<S> {
    pub fn new() -> Self {
        Self {
            covered: HashSet::new(),
            maximum: None,
            testing: true,
        }
    }
}

impl<S> Default for TransitionCoverage<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Eq + Hash> Listener<S> for TransitionCoverage<S> {
    fn on_reset(&mut self, _reason: &str, testing: bool) {
        self.testing = testing;
    }

    fn on_transition_done(&mut self, _action: usize, transition: &Transition<S>) {
        if self.testing {
            self.covered.insert(transition.clone());
        }
    }
}

impl<S: Clone + Eq + Hash> CoverageMetric<S> for TransitionCoverage<S> {
    fn name(&self) -> &str {
        "transition coverage"
    }

    fn coverage_count(&self) -> usize {
        self.covered.len()
    }

    fn maximum_possible(&self) -> i64 {
        self.maximum.map_or(-1, |m| m as i64)
    }

    fn clear(&mut self) {
        self.covered.clear();
    }

    fn on_graph_complete(&mut self, graph: &ExplorationGraph<S>) {
        self.maximum = Some(graph.num_edges());
    }
}
