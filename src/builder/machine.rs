//! Builder for compiling machine definitions.

use super::compile::compile;
use super::error::InvalidDefinition;
use crate::behavior::Behavior;
use crate::core::{
    Assigner, EffectAction, Event, Guard, Machine, MachineConfig, NamedAction, ResolverOptions,
};
use serde_json::Value;
use std::collections::HashMap;

/// Named implementations referenced by a definition.
#[derive(Clone, Default)]
pub(crate) struct Registry {
    pub(crate) guards: HashMap<String, Guard>,
    pub(crate) actions: HashMap<String, NamedAction>,
    pub(crate) sources: HashMap<String, Behavior>,
}

/// Builder pairing a declarative definition with its implementations.
///
/// # Example
///
/// ```rust
/// use statecraft::{Guard, Machine, MachineConfig};
/// use serde_json::json;
///
/// let config: MachineConfig = serde_json::from_value(json!({
///     "id": "door",
///     "initial": "closed",
///     "context": { "locked": false },
///     "states": {
///         "closed": { "on": { "OPEN": { "target": "open", "guard": "unlocked" } } },
///         "open": { "on": { "CLOSE": "closed" } }
///     }
/// })).unwrap();
///
/// let machine = Machine::builder(config)
///     .guard("unlocked", Guard::new(|ctx, _| ctx["locked"] == false))
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.id(), "door");
/// ```
pub struct MachineBuilder {
    config: MachineConfig,
    registry: Registry,
    options: ResolverOptions,
}

impl MachineBuilder {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            registry: Registry::default(),
            options: ResolverOptions::default(),
        }
    }

    /// Register a guard under `name`.
    pub fn guard(mut self, name: impl Into<String>, guard: Guard) -> Self {
        self.registry.guards.insert(name.into(), guard);
        self
    }

    /// Register an effectful action, executed by the actor after each step.
    pub fn action(mut self, name: impl Into<String>, action: EffectAction) -> Self {
        self.registry
            .actions
            .insert(name.into(), NamedAction::Effect(action));
        self
    }

    /// Register a pure context update.
    pub fn assign<F>(mut self, name: impl Into<String>, update: F) -> Self
    where
        F: Fn(&Value, &Event) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.registry
            .actions
            .insert(name.into(), NamedAction::Assign(Assigner::new(update)));
        self
    }

    /// Register a behavior that `spawn` actions and invocations can refer
    /// to by `src`.
    pub fn actor(mut self, src: impl Into<String>, behavior: impl Into<Behavior>) -> Self {
        self.registry.sources.insert(src.into(), behavior.into());
        self
    }

    pub fn options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the definition and compile it.
    ///
    /// Reports every problem found, not just the first.
    pub fn build(self) -> Result<Machine, InvalidDefinition> {
        compile(&self.config, &self.registry, self.options)
    }
}
