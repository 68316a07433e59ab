//! Persisting and restoring actors.
//!
//! A [`PersistedState`] is a plain, versioned serde value describing one
//! actor and, recursively, its children. It captures everything needed to
//! rebuild the actor tree without re-running entry actions. Live resources
//! (timers, pending futures, streams, callback producers) cannot be
//! captured; they are re-provisioned when the restored actor is started.

use crate::actor::ActorStatus;
use crate::behavior::{ObservableState, PromiseState, ReducerState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod error;
pub mod store;

pub use error::CheckpointError;
pub use store::{FileStore, MemoryStore, SnapshotStore, StoreError};

/// Version identifier for the persisted format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Bookkeeping carried across persist/restore cycles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActorMetadata {
    /// When the actor was created
    pub created_at: DateTime<Utc>,

    /// When the actor last processed an event
    pub updated_at: DateTime<Utc>,

    /// Events processed over the actor's whole life
    pub events_processed: u64,
}

impl Default for ActorMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            events_processed: 0,
        }
    }
}

impl ActorMetadata {
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.events_processed += 1;
    }
}

/// Behavior-specific persisted data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistedBehavior {
    Machine {
        /// Ids of the active state nodes, in document order.
        configuration: Vec<String>,
        context: Value,
        /// History node id to the ids it remembers.
        #[serde(default)]
        history: BTreeMap<String, Vec<String>>,
    },
    Promise(PromiseState),
    Callback {
        #[serde(default)]
        input: Value,
    },
    Observable(ObservableState),
    Reducer(ReducerState),
}

impl PersistedBehavior {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Machine { .. } => "machine",
            Self::Promise(_) => "promise",
            Self::Callback { .. } => "callback",
            Self::Observable(_) => "observable",
            Self::Reducer(_) => "reducer",
        }
    }
}

/// Serializable state of an actor tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Format version
    pub version: u32,

    pub id: String,

    /// Source name the parent spawned this actor from; `None` for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    #[serde(default)]
    pub input: Value,

    pub status: ActorStatus,

    pub behavior: PersistedBehavior,

    #[serde(default)]
    pub children: Vec<PersistedState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub metadata: ActorMetadata,
}

impl PersistedState {
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    /// Decode and check the format version.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let state: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        state.validate_version()?;
        Ok(state)
    }

    pub fn validate_version(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        self.children
            .iter()
            .try_for_each(PersistedState::validate_version)
    }
}
