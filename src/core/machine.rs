//! The immutable, compiled machine definition.

use super::configuration::Configuration;
use super::effect::Effect;
use super::event::Event;
use super::history::HistoryRecords;
use super::config::MachineConfig;
use super::node::{NodeId, StateKind, StateNode, ROOT};
use crate::behavior::Behavior;
use crate::builder::MachineBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// How conflicting transitions selected in the same step are resolved.
///
/// Two transitions conflict when their exit sets overlap, which can happen
/// when different parallel regions select transitions leaving a common
/// ancestor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The transition selected first (document order of its source leaf)
    /// wins; later conflicting ones are dropped for this step.
    #[default]
    DocumentOrder,
    /// A transition whose source is a descendant of an earlier conflicting
    /// transition's source preempts it.
    DescendantFirst,
}

/// Tunables for the resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Maximum follow-up microsteps (eventless or internal) per macrostep.
    pub max_microsteps: usize,
    pub conflict_policy: ConflictPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_microsteps: 100,
            conflict_policy: ConflictPolicy::DocumentOrder,
        }
    }
}

/// State of one machine instance: what the resolver reads and produces.
#[derive(Clone, Debug, PartialEq)]
pub struct MachineState {
    pub configuration: Configuration,
    pub context: Value,
    pub history: HistoryRecords,
}

/// Result of resolving one event.
#[derive(Debug)]
pub struct Step {
    pub state: MachineState,
    /// Effects for the actor to apply, in execution order.
    pub effects: Vec<Effect>,
}

impl Step {
    /// Whether the machine reached a top-level final state during the step.
    pub fn is_done(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, Effect::Done { .. }))
    }
}

/// Compiled machine definition. Immutable once built; share it behind `Arc`.
pub struct Machine {
    pub(crate) id: String,
    pub(crate) nodes: Vec<StateNode>,
    pub(crate) by_id: HashMap<String, NodeId>,
    pub(crate) context: Value,
    pub(crate) options: ResolverOptions,
    pub(crate) sources: HashMap<String, Behavior>,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id)
            .field("nodes", &self.nodes.len())
            .field("options", &self.options)
            .finish()
    }
}

impl Machine {
    /// Start building a machine from a declarative definition.
    pub fn builder(config: MachineConfig) -> MachineBuilder {
        MachineBuilder::new(config)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Initial context declared by the definition.
    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn node(&self, node: NodeId) -> &StateNode {
        &self.nodes[node]
    }

    pub fn nodes(&self) -> &[StateNode] {
        &self.nodes
    }

    /// Look a node up by id (without the leading `#`).
    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    pub fn actor_source(&self, src: &str) -> Option<&Behavior> {
        self.sources.get(src)
    }

    /// State before start: nothing active, initial context.
    pub fn initial_state(&self) -> MachineState {
        MachineState {
            configuration: Configuration::new(),
            context: self.context.clone(),
            history: HistoryRecords::new(),
        }
    }

    /// Resolve the start signal: enter the root and its default descendants.
    pub fn start(&self, state: &MachineState) -> Result<Step, super::ResolveError> {
        self.resolve(state, &Event::init())
    }

    /// Node ids of a configuration, in document order.
    pub fn configuration_ids(&self, configuration: &Configuration) -> Vec<String> {
        configuration
            .iter()
            .map(|node| self.nodes[node].id.clone())
            .collect()
    }

    /// Active atomic nodes, in document order.
    pub fn leaves(&self, configuration: &Configuration) -> Vec<NodeId> {
        configuration
            .iter()
            .filter(|&node| self.nodes[node].is_atomic())
            .collect()
    }

    /// Whether `node` is a proper descendant of `ancestor`.
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.nodes[node].parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes[parent].parent;
        }
        false
    }

    /// Ancestors of `node` from its parent upwards, stopping before `until`.
    pub fn proper_ancestors(&self, node: NodeId, until: Option<NodeId>) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.nodes[node].parent;
        while let Some(parent) = current {
            if Some(parent) == until {
                break;
            }
            ancestors.push(parent);
            current = self.nodes[parent].parent;
        }
        ancestors
    }

    /// Least common compound ancestor of `states`; the root if none is
    /// compound.
    pub fn lcca(&self, states: &[NodeId]) -> NodeId {
        let Some((&head, tail)) = states.split_first() else {
            return ROOT;
        };
        for ancestor in self.proper_ancestors(head, None) {
            let compound = self.nodes[ancestor].kind == StateKind::Compound || ancestor == ROOT;
            if compound && tail.iter().all(|&s| self.is_descendant(s, ancestor)) {
                return ancestor;
            }
        }
        ROOT
    }

    /// Check the configuration legality invariant.
    ///
    /// Every active node's parent is active, active compound nodes have
    /// exactly one active child, active parallel nodes have all their
    /// regions active, and history nodes are never active.
    pub fn is_legal(&self, configuration: &Configuration) -> bool {
        if !configuration.contains(ROOT) {
            return false;
        }
        configuration.iter().all(|node| {
            let state = &self.nodes[node];
            if state.is_history() {
                return false;
            }
            if let Some(parent) = state.parent {
                if !configuration.contains(parent) {
                    return false;
                }
            }
            match state.kind {
                StateKind::Compound => {
                    state
                        .children
                        .iter()
                        .filter(|&&child| configuration.contains(child))
                        .count()
                        == 1
                }
                StateKind::Parallel => state
                    .children
                    .iter()
                    .filter(|&&child| !self.nodes[child].is_history())
                    .all(|&child| configuration.contains(child)),
                _ => true,
            }
        })
    }

    /// Nested state value: `"green"`, `{ "walk": "slow" }`, or an object of
    /// regions for parallel nodes. Null before start.
    pub fn state_value(&self, configuration: &Configuration) -> Value {
        if configuration.is_empty() {
            return Value::Null;
        }
        self.node_value(ROOT, configuration)
    }

    fn node_value(&self, node: NodeId, configuration: &Configuration) -> Value {
        let state = &self.nodes[node];
        match state.kind {
            StateKind::Compound => {
                let active = state
                    .children
                    .iter()
                    .copied()
                    .find(|&child| configuration.contains(child));
                match active {
                    Some(child) if self.nodes[child].is_atomic() => {
                        Value::String(self.nodes[child].key.clone())
                    }
                    Some(child) => {
                        let mut map = Map::new();
                        map.insert(
                            self.nodes[child].key.clone(),
                            self.node_value(child, configuration),
                        );
                        Value::Object(map)
                    }
                    None => Value::Null,
                }
            }
            StateKind::Parallel => {
                let mut map = Map::new();
                for &child in &state.children {
                    if self.nodes[child].is_history() {
                        continue;
                    }
                    map.insert(
                        self.nodes[child].key.clone(),
                        self.node_value(child, configuration),
                    );
                }
                Value::Object(map)
            }
            _ => Value::Object(Map::new()),
        }
    }

    /// Timers that should be running for a configuration. Used to re-arm
    /// delayed transitions after a restore.
    pub fn pending_delays(&self, configuration: &Configuration) -> Vec<Effect> {
        configuration
            .iter()
            .flat_map(|node| self.nodes[node].delays.iter())
            .map(|delay| Effect::Schedule {
                id: delay.event.clone(),
                delay: delay.after,
                event: Event::new(delay.event.clone()),
            })
            .collect()
    }
}
