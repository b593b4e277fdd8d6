//! Model introspection layer: binds an action table to a user model and
//! drives it one action at a time, reporting every step to listeners.

pub mod action;
pub mod bits;
pub mod error;
pub mod harness;
pub mod listener;
pub mod transition;

pub use action::{ActionTable, ActionTableBuilder, FsmModel, Guard};
pub use bits::ActionSet;
pub use error::ModelError;
pub use harness::{Harness, Model};
pub use listener::{FailureLog, FailureRecord, FailureSummary, Listener, StopOnFailure, VerboseListener};
pub use transition::{Sequence, Transition};
