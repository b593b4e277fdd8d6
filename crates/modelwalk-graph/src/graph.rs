//! Incrementally discovered directed multigraph of observed states and
//! transitions.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use log::info;
use modelwalk_model::{ActionSet, Listener, Transition};

pub type SharedGraph<S> = Rc<RefCell<ExplorationGraph<S>>>;

#[derive(Debug, Clone)]
struct Vertex<S> {
    state: S,
    /// Actions whose guard was ever observed true here.
    was_enabled: ActionSet,
    /// Actions ever taken from here. Always a subset of `was_enabled`.
    done: ActionSet,
    /// Whether any guard was evaluated while the model was in this state.
    evaluated: bool,
}

/// Directed multigraph of observed behaviour.
///
/// Outstanding work is `was_enabled AND NOT done`, summed over vertices.
/// The graph is complete once there is no outstanding work and every known
/// vertex has had its guards examined; completeness is sticky.
#[derive(Debug, Clone)]
pub struct ExplorationGraph<S> {
    vertices: Vec<Vertex<S>>,
    index: HashMap<S, usize>,
    edges: Vec<Transition<S>>,
    edge_set: HashSet<Transition<S>>,
    outstanding: usize,
    unevaluated: usize,
    complete: bool,
}

impl<S: Clone + Eq + Hash> ExplorationGraph<S> {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            edge_set: HashSet::new(),
            outstanding: 0,
            unevaluated: 0,
            complete: false,
        }
    }

    /// Add `state` as a vertex if it is new. Returns its vertex number.
    pub fn observe_state(&mut self, state: &S) -> usize {
        if let Some(&v) = self.index.get(state) {
            return v;
        }
        let v = self.vertices.len();
        self.vertices.push(Vertex {
            state: state.clone(),
            was_enabled: ActionSet::new(),
            done: ActionSet::new(),
            evaluated: false,
        });
        self.index.insert(state.clone(), v);
        self.unevaluated += 1;
        v
    }

    /// Record a taken transition. Returns true if the edge is new.
    ///
    /// Taking an action implies it was enabled, so `was_enabled` is updated
    /// together with `done`.
    pub fn observe_transition(&mut self, action: usize, transition: &Transition<S>) -> bool {
        let origin = self.observe_state(&transition.start);
        self.observe_state(&transition.end);

        self.enable(origin, action);
        if self.vertices[origin].done.insert(action) {
            self.outstanding -= 1;
        }

        let fresh = self.edge_set.insert(transition.clone());
        if fresh {
            self.edges.push(transition.clone());
        }
        self.update_complete();
        fresh
    }

    /// OR `enabled` into the was-enabled set of `state`.
    pub fn refresh_enabled(&mut self, state: &S, enabled: &ActionSet) {
        let v = self.observe_state(state);
        self.mark_evaluated(v);
        for action in enabled.iter() {
            self.enable(v, action);
        }
        self.update_complete();
    }

    /// Record a single guard result observed in `state`.
    ///
    /// A lone guard says nothing about the other actions, so completeness is
    /// only re-checked by [`refresh_enabled`](Self::refresh_enabled) and
    /// [`observe_transition`](Self::observe_transition).
    pub fn observe_guard(&mut self, state: &S, action: usize, enabled: bool) {
        let v = self.observe_state(state);
        self.mark_evaluated(v);
        if enabled {
            self.enable(v, action);
        }
    }

    /// Total outstanding (state, action) pairs.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Actions seen enabled in `state` but never taken from it.
    pub fn outstanding_for(&self, state: &S) -> ActionSet {
        match self.index.get(state) {
            Some(&v) => {
                let vertex = &self.vertices[v];
                vertex.was_enabled.difference(&vertex.done)
            }
            None => ActionSet::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Forget everything and reseed from the initial state of a fresh reset.
    pub fn clear(&mut self, initial: &S, enabled: &ActionSet) {
        self.vertices.clear();
        self.index.clear();
        self.edges.clear();
        self.edge_set.clear();
        self.outstanding = 0;
        self.unevaluated = 0;
        self.complete = false;
        self.refresh_enabled(initial, enabled);
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// States in discovery order.
    pub fn vertices(&self) -> impl Iterator<Item = &S> + '_ {
        self.vertices.iter().map(|v| &v.state)
    }

    /// Distinct transitions in discovery order.
    pub fn edges(&self) -> &[Transition<S>] {
        &self.edges
    }

    pub fn contains_state(&self, state: &S) -> bool {
        self.index.contains_key(state)
    }

    pub fn contains_edge(&self, transition: &Transition<S>) -> bool {
        self.edge_set.contains(transition)
    }

    pub fn was_enabled(&self, state: &S) -> Option<&ActionSet> {
        self.index.get(state).map(|&v| &self.vertices[v].was_enabled)
    }

    pub fn done(&self, state: &S) -> Option<&ActionSet> {
        self.index.get(state).map(|&v| &self.vertices[v].done)
    }

    fn enable(&mut self, v: usize, action: usize) {
        let vertex = &mut self.vertices[v];
        if vertex.was_enabled.insert(action) && !vertex.done.contains(action) {
            self.outstanding += 1;
        }
    }

    fn mark_evaluated(&mut self, v: usize) {
        let vertex = &mut self.vertices[v];
        if !vertex.evaluated {
            vertex.evaluated = true;
            self.unevaluated -= 1;
        }
    }

    fn update_complete(&mut self) {
        if self.complete || self.outstanding > 0 || self.unevaluated > 0 {
            return;
        }
        if !self.vertices.is_empty() {
            self.complete = true;
            info!(
                "exploration graph complete: {} states, {} transitions",
                self.vertices.len(),
                self.edges.len()
            );
        }
    }
}

impl<S: Clone + Eq + Hash> Default for ExplorationGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Eq + Hash> Listener<S> for ExplorationGraph<S> {
    fn on_guard(&mut self, state: &S, action: usize, enabled: bool, _weight: u32) {
        self.observe_guard(state, action, enabled);
    }

    fn on_transition_done(&mut self, action: usize, transition: &Transition<S>) {
        self.observe_transition(action, transition);
    }
}
