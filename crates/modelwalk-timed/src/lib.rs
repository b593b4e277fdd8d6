//! Simulated time for models that declare a clock.
//!
//! A [`TimedModel`] wraps a plain [`Model`](modelwalk_model::Model) and
//! advances a model-owned time field between actions. Timeout fields bound
//! to actions fire when the clock reaches them; a fired timeout leaves its
//! bound action as the only permitted next step.

pub mod clock;
pub mod config;
pub mod timed;

pub use clock::{Clock, ClockBuilder, TimedFsmModel, Timeout};
pub use config::TimedConfig;
pub use timed::TimedModel;
