//! Compiled state nodes.
//!
//! Nodes live in a flat arena owned by the [`Machine`](super::machine::Machine)
//! and are addressed by [`NodeId`]. Ids are assigned in document order
//! (pre-order), so a parent always has a smaller id than its descendants
//! and sorting by id gives entry order; reverse order gives exit order.

use super::action::Action;
use super::event::EventSelector;
use super::guard::Guard;
use serde_json::Value;
use std::time::Duration;

pub use super::config::{HistoryKind, StateKind};

/// Index of a node in the machine arena.
pub type NodeId = usize;

/// The root node always has id 0.
pub const ROOT: NodeId = 0;

#[derive(Clone, Debug)]
pub struct StateNode {
    /// Unique id; `#id` targets it.
    pub id: String,
    /// Key within the parent's `states` map.
    pub key: String,
    pub kind: StateKind,
    pub parent: Option<NodeId>,
    /// Children in document order.
    pub children: Vec<NodeId>,
    /// Designated initial child of a compound node.
    pub initial: Option<NodeId>,
    /// Depth of history nodes.
    pub history: HistoryKind,
    /// Default targets of a history node.
    pub history_default: Vec<NodeId>,
    pub transitions: Vec<Transition>,
    pub entry: Vec<Action>,
    pub exit: Vec<Action>,
    pub delays: Vec<Delay>,
    pub invocations: Vec<Invocation>,
    /// Output of a final node.
    pub output: Value,
}

impl StateNode {
    pub fn is_atomic(&self) -> bool {
        matches!(self.kind, StateKind::Atomic | StateKind::Final)
    }

    pub fn is_history(&self) -> bool {
        self.kind == StateKind::History
    }
}

#[derive(Clone, Debug)]
pub enum Trigger {
    Event(EventSelector),
    /// Eventless transition, checked after every microstep.
    Always,
}

#[derive(Clone, Debug)]
pub struct NamedGuard {
    pub name: String,
    pub guard: Guard,
}

#[derive(Clone, Debug)]
pub struct Transition {
    pub source: NodeId,
    pub trigger: Trigger,
    pub guard: Option<NamedGuard>,
    /// Zero targets means a targetless transition: actions only.
    pub targets: Vec<NodeId>,
    pub actions: Vec<Action>,
    pub internal: bool,
}

/// Delayed transition timer armed while the node is active.
#[derive(Clone, Debug)]
pub struct Delay {
    pub after: Duration,
    /// Event type delivered when the timer fires; also the timer id.
    pub event: String,
}

/// Child actor bound to the node's lifetime.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub id: String,
    pub src: String,
    pub input: Value,
}

/// Reference to the `index`-th transition of node `source`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransitionRef {
    pub source: NodeId,
    pub index: usize,
}
