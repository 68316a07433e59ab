//! Long-running workflows kept in a snapshot store.
//!
//! A [`WorkflowHost`] never keeps actors alive between calls. Each call
//! restores the actor from the store, starts it, delivers the event,
//! persists the result and stops it again, so a workflow survives process
//! restarts as long as its store does.
//!
//! # Example
//!
//! ```rust
//! use statecraft::checkpoint::MemoryStore;
//! use statecraft::host::WorkflowHost;
//! use statecraft::{Machine, MachineConfig};
//! use serde_json::json;
//!
//! let config: MachineConfig = serde_json::from_value(json!({
//!     "id": "approval",
//!     "initial": "pending",
//!     "states": {
//!         "pending": { "on": { "APPROVE": "approved" } },
//!         "approved": { "type": "final" }
//!     }
//! })).unwrap();
//!
//! let host = WorkflowHost::new(Machine::builder(config).build().unwrap(), MemoryStore::new());
//! let id = host.start_workflow(json!(null)).unwrap();
//! let snapshot = host.send(&id, "APPROVE".into()).unwrap();
//! assert!(snapshot.matches("approved"));
//! ```

use crate::actor::{Actor, ActorError, ActorOptions, Snapshot};
use crate::behavior::Behavior;
use crate::checkpoint::{CheckpointError, PersistedState, SnapshotStore, StoreError};
use crate::core::Event;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Workflow '{id}' not found")]
    NotFound { id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// Runs workflows of one behavior against an injected store.
pub struct WorkflowHost<S: SnapshotStore> {
    behavior: Behavior,
    store: S,
}

impl<S: SnapshotStore> WorkflowHost<S> {
    pub fn new(behavior: impl Into<Behavior>, store: S) -> Self {
        Self {
            behavior: behavior.into(),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a new workflow and persist its initial state.
    ///
    /// Returns the generated workflow id.
    pub fn start_workflow(&self, input: Value) -> Result<String, HostError> {
        let id = Uuid::new_v4().to_string();
        let mut actor = Actor::new(
            self.behavior.clone(),
            ActorOptions::default().with_id(id.clone()).with_input(input),
        );
        actor.start()?;
        self.store.save(&id, &actor.get_persisted_state())?;
        actor.stop();
        info!(workflow = %id, "started workflow");
        Ok(id)
    }

    /// Deliver `event` to workflow `id` and persist the result.
    pub fn send(&self, id: &str, event: Event) -> Result<Snapshot, HostError> {
        let persisted = self.persisted(id)?;
        let mut actor = Actor::restore(self.behavior.clone(), &persisted)?;
        if !actor.status().is_terminal() {
            actor.start()?;
        }
        debug!(workflow = %id, event = %event.kind, "delivering event");
        actor.send(event);
        let snapshot = actor.get_snapshot();
        self.store.save(id, &actor.get_persisted_state())?;
        actor.stop();
        Ok(snapshot)
    }

    /// Stored state of workflow `id`.
    pub fn persisted(&self, id: &str) -> Result<PersistedState, HostError> {
        self.store
            .load(id)?
            .ok_or_else(|| HostError::NotFound { id: id.to_string() })
    }
}
