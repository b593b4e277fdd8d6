pub mod config;
pub mod greedy;
pub mod quick;
pub mod random;
pub mod rng;
pub mod walk;

pub use config::WalkConfig;
pub use greedy::GreedyWalk;
pub use quick::{Path, QuickWalk, Unexplored};
pub use random::RandomWalk;
pub use walk::{Step, Walk, WalkCore, WalkError, WalkReport};
