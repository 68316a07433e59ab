//! Definition errors reported by the machine builder.

use crate::core::StateKind;
use thiserror::Error;

/// One problem found in a machine definition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error("Compound state '{node}' has no initial state. Set `initial` to one of its children")]
    MissingInitial { node: String },

    #[error("Initial state '{initial}' of '{node}' is not a child of that state")]
    UnknownInitial { node: String, initial: String },

    #[error("Transition target '{target}' in state '{node}' does not exist")]
    DanglingTarget { node: String, target: String },

    #[error("Guard '{guard}' used in state '{node}' is not registered")]
    UnknownGuard { node: String, guard: String },

    #[error("Action '{action}' used in state '{node}' is not registered")]
    UnknownAction { node: String, action: String },

    #[error("Actor source '{src}' used in state '{node}' is not registered")]
    UnknownActorSource { node: String, src: String },

    #[error("State '{node}' of type {kind:?} cannot have child states")]
    ChildrenNotAllowed { node: String, kind: StateKind },

    #[error("History state '{node}' must be a child of a compound or parallel state")]
    HistoryOutsideContainer { node: String },

    #[error("State id '{id}' is used more than once")]
    DuplicateId { id: String },

    #[error("Delay '{delay}' in state '{node}' is not a number of milliseconds")]
    InvalidDelay { node: String, delay: String },

    #[error("The root state cannot be of type {kind:?}")]
    InvalidRoot { kind: StateKind },
}

/// Every problem found while building a machine, in document order.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Invalid machine definition: {}", summarize(.0))]
pub struct InvalidDefinition(pub Vec<DefinitionError>);

impl InvalidDefinition {
    pub fn errors(&self) -> &[DefinitionError] {
        &self.0
    }
}

fn summarize(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
