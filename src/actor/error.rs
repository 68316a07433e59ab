//! Actor runtime errors.

use crate::core::ResolveError;
use thiserror::Error;

/// Faults raised while an actor starts or processes an event.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActorError {
    #[error("Actor '{actor}' has already been started")]
    AlreadyStarted { actor: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Action '{name}' failed: {message}")]
    Action { name: String, message: String },

    #[error("Actor '{actor}' needs a tokio runtime for timers and async work")]
    NoRuntime { actor: String },

    #[error("Actor source '{src}' is not registered")]
    UnknownSource { src: String },

    /// Reported by the behavior itself, e.g. a rejected promise.
    #[error("{0}")]
    Failed(String),

    #[error("Actor '{actor}' terminated before the condition was met")]
    Terminated { actor: String },
}
