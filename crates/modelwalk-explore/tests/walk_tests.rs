use std::cell::RefCell;
use std::rc::Rc;

use modelwalk_explore::{GreedyWalk, QuickWalk, RandomWalk, Step, Walk, WalkConfig, WalkError};
use modelwalk_graph::{CoverageMetric, ExplorationGraph, TransitionCoverage};
use modelwalk_model::{
    ActionTableBuilder, FailureLog, FsmModel, Harness, Listener, Model, ModelError, StopOnFailure,
    Transition, VerboseListener,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(reset_probability: f64) -> WalkConfig {
    WalkConfig::default().with_reset_probability(reset_probability)
}

/// `inc` takes 0 to 1, `dec` takes 1 back to 0.
struct Counter {
    value: u8,
}

impl FsmModel for Counter {
    type State = u8;

    fn state(&self) -> u8 {
        self.value
    }

    fn reset(&mut self, _testing: bool) {
        self.value = 0;
    }

    fn actions(&self, table: &mut ActionTableBuilder<Self>) {
        table
            .action("inc", |m: &mut Counter| {
                m.value += 1;
                Ok(())
            })
            .action("dec", |m: &mut Counter| {
                m.value -= 1;
                Ok(())
            })
            .guard("inc", |m: &Counter| m.value == 0)
            .guard("dec", |m: &Counter| m.value == 1);
    }
}

/// `go` leads from 0 into a dead end.
struct DeadEnd {
    at_end: bool,
}

impl FsmModel for DeadEnd {
    type State = bool;

    fn state(&self) -> bool {
        self.at_end
    }

    fn reset(&mut self, _testing: bool) {
        self.at_end = false;
    }

    fn actions(&self, table: &mut ActionTableBuilder<Self>) {
        table
            .action("go", |m: &mut DeadEnd| {
                m.at_end = true;
                Ok(())
            })
            .guard("go", |m: &DeadEnd| !m.at_end);
    }
}

/// A forks to B (`x`) or C (`y`); both lead back to A.
struct Fork {
    at: char,
}

impl FsmModel for Fork {
    type State = char;

    fn state(&self) -> char {
        self.at
    }

    fn reset(&mut self, _testing: bool) {
        self.at = 'A';
    }

    fn actions(&self, table: &mut ActionTableBuilder<Self>) {
        table
            .action("x", |m: &mut Fork| {
                m.at = 'B';
                Ok(())
            })
            .action("y", |m: &mut Fork| {
                m.at = 'C';
                Ok(())
            })
            .action("z", |m: &mut Fork| {
                m.at = 'A';
                Ok(())
            })
            .action("w", |m: &mut Fork| {
                m.at = 'A';
                Ok(())
            })
            .guard("x", |m: &Fork| m.at == 'A')
            .guard("y", |m: &Fork| m.at == 'A')
            .guard("z", |m: &Fork| m.at == 'B')
            .guard("w", |m: &Fork| m.at == 'C');
    }
}

/// Three-state ring with a self-loop in every state.
struct Ring {
    pos: u8,
}

impl FsmModel for Ring {
    type State = u8;

    fn state(&self) -> u8 {
        self.pos
    }

    fn reset(&mut self, _testing: bool) {
        self.pos = 0;
    }

    fn actions(&self, table: &mut ActionTableBuilder<Self>) {
        table
            .action("next", |m: &mut Ring| {
                m.pos = (m.pos + 1) % 3;
                Ok(())
            })
            .action("stay", |_: &mut Ring| Ok(()));
    }
}

/// Five states in a cycle, walkable in both directions.
struct Wheel {
    pos: u8,
}

impl FsmModel for Wheel {
    type State = u8;

    fn state(&self) -> u8 {
        self.pos
    }

    fn reset(&mut self, _testing: bool) {
        self.pos = 0;
    }

    fn actions(&self, table: &mut ActionTableBuilder<Self>) {
        table
            .action("next", |m: &mut Wheel| {
                m.pos = (m.pos + 1) % 5;
                Ok(())
            })
            .action("prev", |m: &mut Wheel| {
                m.pos = (m.pos + 4) % 5;
                Ok(())
            });
    }
}

/// `jump` lands in 1 or 2 depending on a hidden counter that survives resets.
struct Flaky {
    pos: u8,
    jumps: u32,
}

impl FsmModel for Flaky {
    type State = u8;

    fn state(&self) -> u8 {
        self.pos
    }

    fn reset(&mut self, _testing: bool) {
        self.pos = 0;
    }

    fn actions(&self, table: &mut ActionTableBuilder<Self>) {
        table
            .action("jump", |m: &mut Flaky| {
                m.pos = if m.jumps % 2 == 0 { 1 } else { 2 };
                m.jumps += 1;
                Ok(())
            })
            .action("back", |m: &mut Flaky| {
                m.pos = 0;
                Ok(())
            })
            .action("poke", |_: &mut Flaky| Ok(()))
            .guard("jump", |m: &Flaky| m.pos == 0)
            .guard("back", |m: &Flaky| m.pos != 0)
            .guard("poke", |m: &Flaky| m.pos == 1);
    }
}

/// `crash` always fails against the system under test.
struct Brittle {
    ticks: u32,
}

impl FsmModel for Brittle {
    type State = u32;

    fn state(&self) -> u32 {
        self.ticks.min(3)
    }

    fn reset(&mut self, _testing: bool) {
        self.ticks = 0;
    }

    fn actions(&self, table: &mut ActionTableBuilder<Self>) {
        table
            .action("tick", |m: &mut Brittle| {
                m.ticks += 1;
                Ok(())
            })
            .action("crash", |_: &mut Brittle| anyhow::bail!("connection refused"));
    }
}

/// Records every completed transition as text.
#[derive(Default)]
struct Transcript {
    lines: Vec<String>,
}

impl<S: std::fmt::Display> Listener<S> for Transcript {
    fn on_reset(&mut self, _reason: &str, _testing: bool) {
        self.lines.push("reset".to_string());
    }

    fn on_transition_done(&mut self, _action: usize, transition: &Transition<S>) {
        self.lines.push(transition.to_string());
    }
}

/// Counts graph-completion notifications.
#[derive(Default)]
struct CompletionCounter {
    calls: usize,
}

impl Listener<char> for CompletionCounter {}

impl CoverageMetric<char> for CompletionCounter {
    fn name(&self) -> &str {
        "completions"
    }

    fn coverage_count(&self) -> usize {
        0
    }

    fn maximum_possible(&self) -> i64 {
        -1
    }

    fn clear(&mut self) {}

    fn on_graph_complete(&mut self, _graph: &ExplorationGraph<char>) {
        self.calls += 1;
    }
}

fn action_names<H: Harness>(harness: &H) -> Vec<String> {
    harness
        .sequence()
        .to_vec()
        .into_iter()
        .map(|t| t.action)
        .collect()
}

#[test]
fn test_random_walk_counter_scenario() {
    init_logging();
    let model = Model::load(Counter { value: 0 }).unwrap();
    let mut walk = RandomWalk::new(model, &config(0.0)).unwrap();

    assert_eq!(walk.step().unwrap(), Step::Action(0));
    assert_eq!(action_names(walk.harness()), vec!["inc"]);

    walk.generate(3).unwrap();
    assert_eq!(action_names(walk.harness()), vec!["inc", "dec", "inc", "dec"]);
}

#[test]
fn test_random_walk_forces_reset_at_dead_end() {
    let model = Model::load(DeadEnd { at_end: false }).unwrap();
    let mut walk = RandomWalk::new(model, &config(0.0)).unwrap();

    let steps: Vec<Step> = (0..6).map(|_| walk.step().unwrap()).collect();
    assert_eq!(
        steps,
        vec![
            Step::Action(0),
            Step::Reset,
            Step::Action(0),
            Step::Reset,
            Step::Action(0),
            Step::Reset,
        ]
    );
}

#[test]
fn test_random_walk_without_reset_probability_never_resets_spontaneously() {
    let model = Model::load(Ring { pos: 0 }).unwrap();
    let mut walk = RandomWalk::new(model, &config(0.0)).unwrap();

    let report = walk.generate(200).unwrap();
    assert_eq!(report.resets, 0);
    assert_eq!(report.actions, 200);
    assert_eq!(walk.harness().sequence().len(), 200);
}

#[test]
fn test_random_walk_reproducible_for_same_seed() {
    let run = |seed: u64| {
        let mut model = Model::load(Ring { pos: 0 }).unwrap();
        let transcript = Rc::new(RefCell::new(Transcript::default()));
        model.add_listener(Box::new(transcript.clone()));
        let cfg = WalkConfig::default()
            .with_seed(seed)
            .with_reset_probability(0.3);
        let mut walk = RandomWalk::new(model, &cfg).unwrap();
        walk.generate(100).unwrap();
        let lines = transcript.borrow().lines.clone();
        lines
    };

    let first = run(7);
    assert_eq!(first, run(7));
    assert!(first.iter().any(|l| l == "reset"));
    assert_ne!(first, run(8));
}

#[test]
fn test_random_walk_continues_past_failures() {
    let mut model = Model::load(Brittle { ticks: 0 }).unwrap();
    let log = Rc::new(RefCell::new(FailureLog::new()));
    model.add_listener(Box::new(log.clone()));
    let mut walk = RandomWalk::new(model, &config(0.0)).unwrap();

    let report = walk.generate(50).unwrap();
    assert_eq!(report.actions, 50);
    assert!(!log.borrow().is_empty());
    assert!(log.borrow().failures()[0].message.contains("connection refused"));
}

#[test]
fn test_stop_on_failure_aborts_generation() {
    let mut model = Model::load(Brittle { ticks: 0 }).unwrap();
    model.add_listener(Box::new(StopOnFailure));
    let mut walk = RandomWalk::new(model, &config(0.0)).unwrap();

    let err = walk.generate(50).unwrap_err();
    assert!(matches!(
        err,
        WalkError::Model(ModelError::Aborted { ref action, .. }) if action == "crash"
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let model = Model::load(Ring { pos: 0 }).unwrap();
    let result = RandomWalk::new(model, &config(1.0));
    assert!(matches!(result, Err(WalkError::Config(_))));
}

#[test]
fn test_config_from_json_fills_defaults() {
    let cfg: WalkConfig =
        serde_json::from_str(r#"{ "seed": 7, "reset_probability": 0.2 }"#).unwrap();
    assert_eq!(cfg.seed, 7);
    assert_eq!(cfg.reset_probability, 0.2);
    assert_eq!(cfg.max_depth, WalkConfig::default().max_depth);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_build_graph_completes_fork_within_twice_transitions() {
    init_logging();
    let model = Model::load(Fork { at: 'A' }).unwrap();
    let mut walk = GreedyWalk::new(model, &config(0.0)).unwrap();

    let graph = walk.build_graph(8).unwrap();
    let graph = graph.borrow();
    assert!(graph.is_complete());
    assert_eq!(graph.num_vertices(), 3);
    assert_eq!(graph.num_edges(), 4);
    assert_eq!(graph.outstanding(), 0);
    assert_eq!(walk.harness().current_state(), 'A');
}

#[test]
fn test_build_graph_is_repeatable() {
    let model = Model::load(Fork { at: 'A' }).unwrap();
    let mut walk = RandomWalk::new(model, &WalkConfig::default()).unwrap();

    let first = walk.build_graph(100).unwrap().borrow().to_dot("Fork");
    let second = walk.build_graph(100).unwrap().borrow().to_dot("Fork");
    assert_eq!(first, second);
    assert!(first.starts_with("digraph Fork {\n"));
    assert_eq!(first.lines().count(), 6);
}

#[test]
fn test_build_graph_leaves_walk_rng_untouched() {
    let cfg = WalkConfig::default().with_reset_probability(0.2);
    let plain = Model::load(Ring { pos: 0 }).unwrap();
    let built = Model::load(Ring { pos: 0 }).unwrap();

    let mut a = RandomWalk::new(plain, &cfg).unwrap();
    let mut b = RandomWalk::new(built, &cfg).unwrap();
    b.build_graph(50).unwrap();

    let steps_a: Vec<Step> = (0..40).map(|_| a.step().unwrap()).collect();
    let steps_b: Vec<Step> = (0..40).map(|_| b.step().unwrap()).collect();
    assert_eq!(steps_a, steps_b);
}

#[test]
fn test_graph_completion_reported_once() {
    let model = Model::load(Fork { at: 'A' }).unwrap();
    let mut walk = GreedyWalk::new(model, &config(0.0)).unwrap();
    let counter = Rc::new(RefCell::new(CompletionCounter::default()));
    let transitions = Rc::new(RefCell::new(TransitionCoverage::new()));
    walk.add_metric(counter.clone());
    walk.add_metric(transitions.clone());

    walk.build_graph(50).unwrap();
    walk.build_graph(50).unwrap();
    walk.generate(200).unwrap();

    assert_eq!(counter.borrow().calls, 1);
    assert_eq!(transitions.borrow().maximum_possible(), 4);
    assert_eq!(transitions.borrow().coverage_count(), 4);
    assert_eq!(transitions.borrow().percentage(), 100.0);
}

#[test]
fn test_greedy_walk_covers_fork_in_four_steps() {
    let model = Model::load(Fork { at: 'A' }).unwrap();
    let mut walk = GreedyWalk::new(model, &config(0.0)).unwrap();

    let report = walk.generate(4).unwrap();
    assert_eq!(report.actions, 4);
    assert!(walk.graph().borrow().is_complete());
}

#[test]
fn test_quick_walk_covers_ring() {
    let model = Model::load(Ring { pos: 0 }).unwrap();
    let mut walk = QuickWalk::new(model, &WalkConfig::default()).unwrap();
    let coverage = Rc::new(RefCell::new(TransitionCoverage::new()));
    walk.add_metric(coverage.clone());

    walk.generate(300).unwrap();
    assert_eq!(coverage.borrow().coverage_count(), 6);
}

#[test]
fn test_quick_walk_respects_max_depth() {
    let model = Model::load(Ring { pos: 0 }).unwrap();
    let cfg = WalkConfig {
        max_depth: 5,
        ..WalkConfig::default()
    };
    let mut walk = QuickWalk::new(model, &cfg).unwrap();

    let mut resets = 0;
    for _ in 0..100 {
        if walk.step().unwrap() == Step::Reset {
            resets += 1;
        }
        assert!(walk.harness().sequence().len() <= 5);
    }
    assert!(resets >= 100 / 6);
}

#[test]
fn test_quick_walk_remembers_first_path() {
    let model = Model::load(Flaky { pos: 0, jumps: 0 }).unwrap();
    let mut walk = QuickWalk::new(model, &config(0.0)).unwrap();

    // jump (0 -> 1) leaves `back` and `poke` untried in state 1.
    assert_eq!(walk.step().unwrap(), Step::Action(0));
    assert_eq!(walk.unexplored_len(), 2);

    let pair = modelwalk_explore::Unexplored { state: 1u8, action: 1 };
    let path = walk.path_to(&pair).unwrap();
    assert_eq!(path.depth(), 1);
    assert_eq!(path.steps(), vec![Transition::new(0u8, "jump", 1)]);

    // The path stays valid while the session grows.
    walk.step().unwrap();
    if let Some(path) = walk.path_to(&pair) {
        assert_eq!(path.steps().len(), 1);
    }
}

#[test]
fn test_quick_walk_abandons_unreproducible_replay() {
    let model = Model::load(Flaky { pos: 0, jumps: 0 }).unwrap();
    let cfg = WalkConfig {
        max_depth: 2,
        backtrack_probability: 1.0,
        reset_probability: 0.0,
        ..WalkConfig::default()
    };
    let mut walk = QuickWalk::new(model, &cfg).unwrap();

    let report = walk.generate(4).unwrap();
    assert_eq!(report.steps, 4);
    assert!(walk.abandoned() >= 1);
    assert!(!walk.is_replaying());
    assert_eq!(walk.harness().current_state(), 0);

    let report = walk.generate(300).unwrap();
    assert_eq!(report.steps, 300);
}

#[test]
fn test_quick_walk_memory_capacity_drops_new_pairs() {
    let model = Model::load(Flaky { pos: 0, jumps: 0 }).unwrap();
    let cfg = WalkConfig {
        max_unexplored: 1,
        reset_probability: 0.0,
        ..WalkConfig::default()
    };
    let mut walk = QuickWalk::new(model, &cfg).unwrap();

    walk.step().unwrap();
    assert_eq!(walk.unexplored_len(), 1);
    assert_eq!(walk.dropped(), 1);
}

#[test]
fn test_verbose_listener_logs_without_aborting() {
    init_logging();
    let mut model = Model::load(Brittle { ticks: 0 }).unwrap();
    model.add_listener(Box::new(VerboseListener));
    let log = Rc::new(RefCell::new(FailureLog::new()));
    model.add_listener(Box::new(log.clone()));
    let mut walk = RandomWalk::new(model, &WalkConfig::default()).unwrap();

    let report = walk.generate(40).unwrap();
    assert_eq!(report.steps, 40);
    assert!(!log.borrow().is_empty());
    assert_eq!(log.borrow().failures()[0].action, "crash");
}

#[test]
fn test_build_graph_completes_wheel_within_twice_transitions() {
    let model = Model::load(Wheel { pos: 0 }).unwrap();
    let mut walk = GreedyWalk::new(model, &WalkConfig::default()).unwrap();

    let graph = walk.build_graph(20).unwrap();
    let graph = graph.borrow();
    assert!(graph.is_complete());
    assert_eq!(graph.num_vertices(), 5);
    assert_eq!(graph.num_edges(), 10);
}

#[test]
fn test_quick_walk_rolls_spontaneous_resets() {
    let count_resets = |p: f64| {
        let model = Model::load(Ring { pos: 0 }).unwrap();
        let mut walk = QuickWalk::new(model, &config(p)).unwrap();
        walk.generate(100).unwrap().resets
    };

    // Without spontaneous resets only the depth limit of 20 resets.
    assert!(count_resets(0.0) <= 4);
    assert!(count_resets(0.5) > 20);
}
