pub mod coverage;
pub mod dot;
pub mod graph;

pub use coverage::{ActionCoverage, CoverageMetric, StateCoverage, TransitionCoverage};
pub use graph::{ExplorationGraph, SharedGraph};
