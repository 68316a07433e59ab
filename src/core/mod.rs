//! Core statechart types and logic.
//!
//! This module contains the pure core of the interpreter:
//! - Declarative definitions (`MachineConfig`) and the compiled node arena
//! - Events, guards and actions
//! - The resolver, which turns a state and an event into a new state plus
//!   an ordered list of effects
//!
//! Nothing in this module performs I/O or spawns tasks. Effects are data;
//! the actor layer applies them.

pub mod action;
pub mod config;
pub mod configuration;
pub mod effect;
mod error;
pub mod event;
mod guard;
mod history;
mod machine;
pub mod node;
mod resolver;

pub use action::{merge_patch, Action, ActionArgs, Assigner, EffectAction, NamedAction};
pub use config::{
    ActionConfig, BuiltinAction, HistoryKind, InvokeConfig, MachineConfig, StateConfig,
    StateKind, Targets, TransitionConfig, TransitionsConfig,
};
pub use configuration::Configuration;
pub use effect::Effect;
pub use error::ResolveError;
pub use event::{Event, EventSelector, INIT_EVENT, STOP_EVENT};
pub use guard::Guard;
pub use history::HistoryRecords;
pub use machine::{ConflictPolicy, Machine, MachineState, ResolverOptions, Step};
pub use node::{NodeId, StateNode, ROOT};
