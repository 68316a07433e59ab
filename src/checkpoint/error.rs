//! Checkpoint error types.

use thiserror::Error;

/// Errors that can occur while persisting or restoring actors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CheckpointError {
    /// Serialization to JSON failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization from JSON failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Checkpoint version is not supported by this version
    #[error("Unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// A persisted configuration names a state the machine does not have
    #[error("Unknown state node '{id}'")]
    UnknownNode { id: String },

    /// The persisted configuration violates the machine's structure
    #[error("Illegal configuration: {}", .ids.join(", "))]
    IllegalConfiguration { ids: Vec<String> },

    /// A persisted child refers to an actor source the parent cannot provide
    #[error("Actor source '{src}' is not available for child '{id}'")]
    UnknownSource { id: String, src: String },

    /// Persisted data belongs to a different kind of behavior
    #[error("Persisted {found} state cannot restore a {expected} behavior")]
    BehaviorMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
