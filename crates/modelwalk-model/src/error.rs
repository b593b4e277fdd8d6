use thiserror::Error;

/// Errors raised by the model layer.
///
/// Everything except `Aborted` is a model-authoring mistake and is fatal:
/// guards are selection logic written by the model author, so a guard
/// that cannot be evaluated is reported here rather than as a test failure.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model `{model}` declares no actions")]
    NoActions { model: String },

    #[error("duplicate action name `{name}`")]
    DuplicateAction { name: String },

    #[error("guard registered for unknown action `{name}`")]
    UnknownGuardTarget { name: String },

    #[error("action `{name}` has more than one guard")]
    DuplicateGuard { name: String },

    #[error("guard of action `{action}` failed: {reason}")]
    GuardFault { action: String, reason: String },

    #[error("action index {index} out of range (model has {count} actions)")]
    BadActionIndex { index: usize, count: usize },

    #[error("timed model `{model}` declares no time field")]
    MissingTimeField { model: String },

    #[error("timed model declares more than one time field (`{first}` and `{second}`)")]
    DuplicateTimeField { first: String, second: String },

    #[error("duplicate timeout field `{name}`")]
    DuplicateTimeout { name: String },

    #[error("timeout `{timeout}` is bound to unknown action `{action}`")]
    UnknownTimeoutAction { timeout: String, action: String },

    #[error("generation aborted after failure of `{action}`: {reason}")]
    Aborted { action: String, reason: String },
}
