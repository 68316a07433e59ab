//! Declarative machine definitions.
//!
//! A [`MachineConfig`] is plain data: it can be written in Rust, loaded from
//! JSON, or built with `serde_json::json!`. It names guards, actions and
//! actor sources; their implementations are registered separately on the
//! [`MachineBuilder`](super::machine::MachineBuilder).
//!
//! ```rust
//! use statecraft::MachineConfig;
//!
//! let config: MachineConfig = serde_json::from_str(r#"{
//!     "id": "light",
//!     "initial": "green",
//!     "context": { "cycles": 0 },
//!     "states": {
//!         "green":  { "on": { "TIMER": "yellow" } },
//!         "yellow": { "on": { "TIMER": "red" } },
//!         "red":    { "on": { "TIMER": { "target": "green", "actions": "countCycle" } } }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(config.root.states.len(), 3);
//! ```

use super::event::Event;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Top-level machine definition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Machine id, also the id of the root state node.
    pub id: String,

    /// Initial context.
    #[serde(default)]
    pub context: Value,

    /// The root state node.
    #[serde(flatten)]
    pub root: StateConfig,
}

impl MachineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Atomic,
    Compound,
    Parallel,
    History,
    Final,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    #[default]
    Shallow,
    Deep,
}

/// One state node of the definition tree.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateConfig {
    /// Explicit node id, addressable as `#id`. Defaults to the dotted path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Node kind. Inferred as compound when `states` is non-empty, else atomic.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StateKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub states: IndexMap<String, StateConfig>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub on: IndexMap<String, TransitionsConfig>,

    /// Eventless transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always: Option<TransitionsConfig>,

    /// Delayed transitions keyed by delay in milliseconds.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub after: IndexMap<String, TransitionsConfig>,

    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub entry: Vec<ActionConfig>,

    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub exit: Vec<ActionConfig>,

    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub invoke: Vec<InvokeConfig>,

    /// History depth, for `type: history` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryKind>,

    /// Default target of a history node with no recorded configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Output of a final node, carried by the completion event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// Transitions for one trigger: a bare target, one descriptor, or a list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransitionsConfig {
    Target(String),
    Many(Vec<TransitionConfig>),
    One(TransitionConfig),
}

impl TransitionsConfig {
    pub fn into_vec(self) -> Vec<TransitionConfig> {
        match self {
            Self::Target(target) => vec![TransitionConfig {
                target: Some(Targets::One(target)),
                ..TransitionConfig::default()
            }],
            Self::Many(transitions) => transitions,
            Self::One(transition) => vec![transition],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Targets>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,

    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub actions: Vec<ActionConfig>,

    /// Keep the source node active when targeting its own descendants.
    #[serde(default)]
    pub internal: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Targets {
    One(String),
    Many(Vec<String>),
}

impl Targets {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(target) => vec![target.clone()],
            Self::Many(targets) => targets.clone(),
        }
    }
}

/// An action reference: the name of a registered implementation, or a
/// built-in action object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionConfig {
    Named(String),
    Builtin(BuiltinAction),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BuiltinAction {
    Assign {
        assignment: serde_json::Map<String, Value>,
    },
    Raise {
        event: Event,
    },
    SendParent {
        event: Event,
    },
    SendTo {
        to: String,
        event: Event,
    },
    Spawn {
        id: String,
        src: String,
        #[serde(default)]
        input: Value,
    },
    Stop {
        id: String,
    },
    Log {
        message: String,
    },
}

/// A child actor living exactly as long as its state node is active.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub src: String,

    #[serde(default)]
    pub input: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_done: Option<TransitionsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<TransitionsConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}
