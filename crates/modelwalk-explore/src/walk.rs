//! Shared walk machinery: the seeded core every algorithm drives the model
//! through, and the `Walk` trait with generation and graph construction.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info, warn};
use modelwalk_graph::{CoverageMetric, ExplorationGraph, SharedGraph};
use modelwalk_model::{ActionSet, Harness, Listener, ModelError};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::config::WalkConfig;
use crate::rng::{stream_rng, GRAPH_SEED, WALK_STREAM};

#[derive(Debug, Error)]
pub enum WalkError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// What one call to [`Walk::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Reset,
    Action(usize),
}

/// Totals of a [`Walk::generate`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub steps: usize,
    pub actions: usize,
    pub resets: usize,
}

type SharedMetric<S> = Rc<RefCell<dyn CoverageMetric<S>>>;

/// State shared by all walk algorithms: the driven harness, the walk's own
/// random source, the lazily attached exploration graph and coverage metrics.
pub struct WalkCore<H: Harness> {
    harness: H,
    rng: ChaCha8Rng,
    reset_probability: f64,
    graph: Option<SharedGraph<H::State>>,
    metrics: Vec<SharedMetric<H::State>>,
    graph_reported: bool,
}

impl<H: Harness> WalkCore<H> {
    pub fn new(harness: H, config: &WalkConfig) -> Result<Self, WalkError> {
        config.validate()?;
        Ok(Self {
            harness,
            rng: stream_rng(config.seed, WALK_STREAM),
            reset_probability: config.reset_probability,
            graph: None,
            metrics: Vec::new(),
            graph_reported: false,
        })
    }

    pub fn harness(&self) -> &H {
        &self.harness
    }

    pub fn harness_mut(&mut self) -> &mut H {
        &mut self.harness
    }

    pub fn into_harness(self) -> H {
        self.harness
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn reset_probability(&self) -> f64 {
        self.reset_probability
    }

    /// True with probability `p`.
    pub fn roll(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }

    pub fn reset(&mut self, reason: &str, testing: bool) -> Step {
        debug!("reset: {reason}");
        self.harness.reset(reason, testing);
        Step::Reset
    }

    /// Uniformly chosen member of `set`.
    pub fn pick(&mut self, set: &ActionSet) -> Option<usize> {
        if set.is_empty() {
            return None;
        }
        let k = self.rng.gen_range(0..set.len());
        set.nth(k)
    }

    /// Try actions in random order without repetition until one is enabled
    /// and succeeds. `None` when all actions were exhausted.
    pub fn random_action(&mut self) -> Result<Option<usize>, WalkError> {
        let mut untried = ActionSet::full(self.harness.num_actions());
        while let Some(action) = self.pick(&untried) {
            untried.remove(action);
            if self.harness.do_action(action)? {
                return Ok(Some(action));
            }
        }
        Ok(None)
    }

    /// Try the current state's outstanding actions in random order.
    pub fn greedy_action(&mut self) -> Result<Option<usize>, WalkError> {
        let graph = self.graph();
        let state = self.harness.current_state();
        let enabled = self.harness.enabled_set()?;
        graph.borrow_mut().refresh_enabled(&state, &enabled);
        let mut todo = graph.borrow().outstanding_for(&state);
        while let Some(action) = self.pick(&todo) {
            todo.remove(action);
            if self.harness.do_action(action)? {
                return Ok(Some(action));
            }
        }
        Ok(None)
    }

    /// One greedy step: random reset, else outstanding work, else any action,
    /// else a forced reset.
    pub fn greedy_step(&mut self, testing: bool) -> Result<Step, WalkError> {
        if self.roll(self.reset_probability) {
            return Ok(self.reset("random reset", testing));
        }
        if let Some(action) = self.greedy_action()? {
            return Ok(Step::Action(action));
        }
        match self.random_action()? {
            Some(action) => Ok(Step::Action(action)),
            None => Ok(self.reset("no enabled action", testing)),
        }
    }

    /// The exploration graph, registered as a listener on first use.
    pub fn graph(&mut self) -> SharedGraph<H::State> {
        if let Some(graph) = &self.graph {
            return Rc::clone(graph);
        }
        let graph = Rc::new(RefCell::new(ExplorationGraph::new()));
        self.harness.add_listener(Box::new(Rc::clone(&graph)));
        self.graph = Some(Rc::clone(&graph));
        graph
    }

    pub fn add_metric<C>(&mut self, metric: Rc<RefCell<C>>)
    where
        C: CoverageMetric<H::State> + 'static,
    {
        let metric: SharedMetric<H::State> = metric;
        self.harness.add_listener(Box::new(Rc::clone(&metric)));
        self.metrics.push(metric);
    }

    /// Tell the metrics about a complete graph, once.
    pub fn notify_if_complete(&mut self) {
        if self.graph_reported {
            return;
        }
        let Some(graph) = &self.graph else {
            return;
        };
        let graph = graph.borrow();
        if !graph.is_complete() {
            return;
        }
        for metric in &self.metrics {
            metric.borrow_mut().on_graph_complete(&graph);
        }
        self.graph_reported = true;
    }

    /// Explore the model greedily until the graph is complete or `max_steps`
    /// steps were taken.
    ///
    /// Runs under the fixed [`GRAPH_SEED`] so repeated calls discover the same
    /// graph. The walk's random source, and any the harness keeps, are
    /// restored afterwards.
    pub fn build_graph(&mut self, max_steps: usize) -> Result<SharedGraph<H::State>, WalkError> {
        let graph = self.graph();
        let saved = std::mem::replace(&mut self.rng, stream_rng(GRAPH_SEED, WALK_STREAM));
        self.harness.begin_graph_build(GRAPH_SEED);
        let explored = self.explore_graph(&graph, max_steps);
        self.harness.end_graph_build();
        self.rng = saved;
        self.harness.reset("graph built", true);
        let steps = explored?;

        {
            let g = graph.borrow();
            if g.is_complete() {
                info!(
                    "built graph of {} in {steps} steps: {} states, {} transitions",
                    self.harness.model_name(),
                    g.num_vertices(),
                    g.num_edges()
                );
            } else {
                warn!(
                    "graph of {} incomplete after {steps} steps: {} states, {} transitions, {} outstanding",
                    self.harness.model_name(),
                    g.num_vertices(),
                    g.num_edges(),
                    g.outstanding()
                );
            }
        }
        self.notify_if_complete();
        Ok(graph)
    }

    fn explore_graph(
        &mut self,
        graph: &SharedGraph<H::State>,
        max_steps: usize,
    ) -> Result<usize, WalkError> {
        self.harness.reset("build graph", false);
        let initial = self.harness.current_state();
        let enabled = self.harness.enabled_set()?;
        graph.borrow_mut().clear(&initial, &enabled);

        let mut steps = 0;
        while steps < max_steps && !graph.borrow().is_complete() {
            self.greedy_step(false)?;
            steps += 1;
        }
        Ok(steps)
    }
}

/// A test-generation algorithm over a [`Harness`].
pub trait Walk {
    type Harness: Harness;

    fn core(&self) -> &WalkCore<Self::Harness>;

    fn core_mut(&mut self) -> &mut WalkCore<Self::Harness>;

    fn name(&self) -> &'static str;

    /// Advance the model by one reset or one action.
    fn step(&mut self) -> Result<Step, WalkError>;

    /// Take `length` steps.
    fn generate(&mut self, length: usize) -> Result<WalkReport, WalkError> {
        let mut report = WalkReport::default();
        for _ in 0..length {
            match self.step()? {
                Step::Reset => report.resets += 1,
                Step::Action(_) => report.actions += 1,
            }
            report.steps += 1;
            self.core_mut().notify_if_complete();
        }
        debug!(
            "{}: {} steps, {} actions, {} resets",
            self.name(),
            report.steps,
            report.actions,
            report.resets
        );
        Ok(report)
    }

    fn build_graph(
        &mut self,
        max_steps: usize,
    ) -> Result<SharedGraph<<Self::Harness as Harness>::State>, WalkError> {
        self.core_mut().build_graph(max_steps)
    }

    fn graph(&mut self) -> SharedGraph<<Self::Harness as Harness>::State> {
        self.core_mut().graph()
    }

    fn add_listener(&mut self, listener: Box<dyn Listener<<Self::Harness as Harness>::State>>) {
        self.core_mut().harness_mut().add_listener(listener);
    }

    fn add_metric<C>(&mut self, metric: Rc<RefCell<C>>)
    where
        C: CoverageMetric<<Self::Harness as Harness>::State> + 'static,
        Self: Sized,
    {
        self.core_mut().add_metric(metric);
    }

    fn harness(&self) -> &Self::Harness {
        self.core().harness()
    }

    fn harness_mut(&mut self) -> &mut Self::Harness {
        self.core_mut().harness_mut()
    }
}
