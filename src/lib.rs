//! Statecraft: hierarchical statecharts with a lightweight actor runtime
//!
//! Statecraft splits a running system into a pure core and an imperative
//! shell. The core resolves events against a compiled statechart and returns
//! the new configuration plus an ordered list of effects; it never touches
//! the outside world. Actors form the shell: they own behaviors, apply
//! effects, supervise children and publish snapshots.
//!
//! # Core Concepts
//!
//! - **Machine**: a compiled, validated statechart definition
//! - **Resolver**: `(state, event) -> (state, effects)`, with SCXML-style
//!   exit/transition/entry ordering, history, parallel regions and eventless
//!   transitions
//! - **Behavior**: what an actor runs; a machine, a promise, a callback, an
//!   observable stream or a reducer
//! - **Actor**: a running behavior with a mailbox, children and subscribers
//! - **Checkpoint**: versioned persisted state for restoring actor trees
//!
//! # Example
//!
//! ```rust
//! use statecraft::{Actor, ActorOptions, Machine, MachineConfig};
//! use serde_json::json;
//!
//! let config: MachineConfig = serde_json::from_value(json!({
//!     "id": "light",
//!     "initial": "green",
//!     "context": { "cycles": 0 },
//!     "states": {
//!         "green": { "on": { "TIMER": "yellow" } },
//!         "yellow": { "on": { "TIMER": "red" } },
//!         "red": { "on": { "TIMER": { "target": "green", "actions": "count" } } }
//!     }
//! })).unwrap();
//!
//! let machine = Machine::builder(config)
//!     .assign("count", |ctx, _| Ok(json!({ "cycles": ctx["cycles"].as_i64().unwrap_or(0) + 1 })))
//!     .build()
//!     .unwrap();
//!
//! let mut light = Actor::new(machine, ActorOptions::default());
//! light.start().unwrap();
//! for _ in 0..4 {
//!     light.send("TIMER");
//! }
//!
//! let snapshot = light.get_snapshot();
//! assert!(snapshot.matches("yellow"));
//! assert_eq!(snapshot.context["cycles"], 1);
//! ```

pub mod actor;
pub mod behavior;
pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod host;
pub mod telemetry;

// Re-export commonly used types
pub use actor::{Actor, ActorError, ActorOptions, ActorRef, ActorStatus, Snapshot};
pub use behavior::Behavior;
pub use builder::{InvalidDefinition, MachineBuilder};
pub use checkpoint::PersistedState;
pub use core::{
    ActionArgs, EffectAction, Event, Guard, Machine, MachineConfig, ResolveError, ResolverOptions,
};
