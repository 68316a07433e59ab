//! Resolution errors.

use thiserror::Error;

/// Faults raised while resolving a step.
///
/// Every variant is fatal for the actor running the step.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("Guard '{name}' failed: {message}")]
    Guard { name: String, message: String },

    #[error("Action '{name}' failed: {message}")]
    Action { name: String, message: String },

    #[error("Eventless transitions did not settle within {limit} microsteps")]
    MicrostepLimit { limit: usize },
}
