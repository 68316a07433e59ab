//! Builder API for compiling machine definitions.
//!
//! A [`MachineConfig`](crate::core::MachineConfig) names its guards, actions
//! and actor sources; [`MachineBuilder`] binds those names to
//! implementations and compiles the whole thing into an immutable
//! [`Machine`](crate::core::Machine).

mod compile;
pub mod error;
pub mod machine;

pub use error::{DefinitionError, InvalidDefinition};
pub use machine::MachineBuilder;
