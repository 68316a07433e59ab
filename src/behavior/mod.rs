//! Behaviors: what an actor runs.
//!
//! Every actor runs exactly one [`Behavior`], a closed set of variants
//! dispatched through one contract:
//!
//! - `initial_state(input)`: the state before start
//! - `start(state, scope)`: provision and return the started state
//! - `transition(state, event, scope)`: react to one event
//! - `snapshot(state)`: the externally visible projection
//!
//! plus teardown (`stop`), `resume` after a restore, and conversion to and
//! from [`PersistedBehavior`]. Behaviors never apply side effects
//! themselves; they push [`Effect`](crate::core::Effect)s into the
//! [`ActorScope`] and the actor applies them.

mod callback;
mod machine;
mod observable;
mod promise;
mod reducer;

pub use callback::{CallbackLogic, CallbackScope, CallbackState, Disposer};
pub use observable::{ObservableLogic, ObservableState, ObservableStatus};
pub use promise::{PromiseLogic, PromiseState, PromiseStatus};
pub use reducer::{ReducerLogic, ReducerState};

use crate::actor::{ActorError, ActorScope};
use crate::checkpoint::{CheckpointError, PersistedBehavior};
use crate::core::{Event, Machine, MachineState};
use futures::Stream;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// The logic an actor runs.
///
/// Cheap to clone; every variant shares its implementation behind `Arc`.
#[derive(Clone, Debug)]
pub enum Behavior {
    Machine(Arc<Machine>),
    Promise(PromiseLogic),
    Callback(CallbackLogic),
    Observable(ObservableLogic),
    Reducer(ReducerLogic),
}

/// State owned by an actor, one variant per behavior.
#[derive(Clone, Debug)]
pub enum BehaviorState {
    Machine(MachineState),
    Promise(PromiseState),
    Callback(CallbackState),
    Observable(ObservableState),
    Reducer(ReducerState),
}

/// Projection published in snapshots.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    pub value: Value,
    pub context: Value,
}

impl Behavior {
    pub fn machine(machine: Machine) -> Self {
        Self::Machine(Arc::new(machine))
    }

    /// A single async operation producing the actor's output.
    ///
    /// ```rust
    /// use statecraft::Behavior;
    /// use serde_json::json;
    ///
    /// let fetch = Behavior::promise(|input| async move {
    ///     Ok(json!({ "user": input["id"] }))
    /// });
    /// assert_eq!(fetch.kind(), "promise");
    /// ```
    pub fn promise<F, Fut>(create: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        Self::Promise(PromiseLogic::new(create))
    }

    pub fn callback<F>(setup: F) -> Self
    where
        F: Fn(&mut CallbackScope) -> Option<Disposer> + Send + Sync + 'static,
    {
        Self::Callback(CallbackLogic::new(setup))
    }

    pub fn observable<F, S>(create: F) -> Self
    where
        F: Fn(Value) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Value, String>> + Send + 'static,
    {
        Self::Observable(ObservableLogic::new(create))
    }

    pub fn reducer<F>(initial: Value, reduce: F) -> Self
    where
        F: Fn(&Value, &Event) -> Value + Send + Sync + 'static,
    {
        Self::Reducer(ReducerLogic::new(initial, reduce))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Machine(_) => "machine",
            Self::Promise(_) => "promise",
            Self::Callback(_) => "callback",
            Self::Observable(_) => "observable",
            Self::Reducer(_) => "reducer",
        }
    }

    /// Id used for a root actor when none is given.
    pub(crate) fn default_id(&self) -> String {
        match self {
            Self::Machine(machine) => machine.id().to_string(),
            other => other.kind().to_string(),
        }
    }

    /// Behavior registered under `src`, for children spawned by this one.
    pub fn source(&self, src: &str) -> Option<Behavior> {
        match self {
            Self::Machine(machine) => machine.actor_source(src).cloned(),
            _ => None,
        }
    }

    pub fn initial_state(&self, input: &Value) -> BehaviorState {
        match self {
            Self::Machine(m) => BehaviorState::Machine(machine::initial_state(m, input)),
            Self::Promise(p) => BehaviorState::Promise(p.initial_state(input)),
            Self::Callback(c) => BehaviorState::Callback(c.initial_state(input)),
            Self::Observable(o) => BehaviorState::Observable(o.initial_state(input)),
            Self::Reducer(r) => BehaviorState::Reducer(r.initial_state(input)),
        }
    }

    pub fn start(
        &self,
        state: &BehaviorState,
        scope: &mut ActorScope<'_>,
    ) -> Result<BehaviorState, ActorError> {
        Ok(match (self, state) {
            (Self::Machine(m), BehaviorState::Machine(s)) => {
                BehaviorState::Machine(machine::start(m, s, scope)?)
            }
            (Self::Promise(p), BehaviorState::Promise(s)) => {
                BehaviorState::Promise(p.start(s, scope)?)
            }
            (Self::Callback(c), BehaviorState::Callback(s)) => {
                BehaviorState::Callback(c.start(s, scope))
            }
            (Self::Observable(o), BehaviorState::Observable(s)) => {
                BehaviorState::Observable(o.start(s, scope)?)
            }
            _ => state.clone(),
        })
    }

    /// Re-provision a restored state: re-arm timers, re-run pending
    /// operations, re-subscribe streams, re-run callback setup.
    pub fn resume(
        &self,
        state: &BehaviorState,
        scope: &mut ActorScope<'_>,
    ) -> Result<BehaviorState, ActorError> {
        match (self, state) {
            (Self::Machine(m), BehaviorState::Machine(s)) => {
                machine::resume(m, s, scope);
                Ok(state.clone())
            }
            _ => self.start(state, scope),
        }
    }

    pub fn transition(
        &self,
        state: &BehaviorState,
        event: &Event,
        scope: &mut ActorScope<'_>,
    ) -> Result<BehaviorState, ActorError> {
        Ok(match (self, state) {
            (Self::Machine(m), BehaviorState::Machine(s)) => {
                BehaviorState::Machine(machine::transition(m, s, event, scope)?)
            }
            (Self::Promise(p), BehaviorState::Promise(s)) => {
                BehaviorState::Promise(p.transition(s, event, scope))
            }
            (Self::Callback(c), BehaviorState::Callback(s)) => {
                BehaviorState::Callback(c.transition(s, event))
            }
            (Self::Observable(o), BehaviorState::Observable(s)) => {
                BehaviorState::Observable(o.transition(s, event, scope))
            }
            (Self::Reducer(r), BehaviorState::Reducer(s)) => {
                BehaviorState::Reducer(r.transition(s, event))
            }
            _ => state.clone(),
        })
    }

    pub fn snapshot(&self, state: &BehaviorState) -> View {
        match (self, state) {
            (Self::Machine(m), BehaviorState::Machine(s)) => View {
                value: m.state_value(&s.configuration),
                context: s.context.clone(),
            },
            (_, BehaviorState::Promise(s)) => View {
                value: s.output.clone().unwrap_or(Value::Null),
                context: s.input.clone(),
            },
            (_, BehaviorState::Observable(s)) => View {
                value: s.value.clone().unwrap_or(Value::Null),
                context: s.input.clone(),
            },
            (_, BehaviorState::Reducer(s)) => View {
                value: Value::Null,
                context: s.state.clone(),
            },
            (_, BehaviorState::Callback(s)) => View {
                value: Value::Null,
                context: s.input.clone(),
            },
            (_, BehaviorState::Machine(s)) => View {
                value: Value::Null,
                context: s.context.clone(),
            },
        }
    }

    /// Release live resources held by the state.
    pub fn stop(&self, state: &mut BehaviorState) {
        match (self, state) {
            (Self::Promise(p), BehaviorState::Promise(s)) => p.stop(s),
            (Self::Callback(c), BehaviorState::Callback(s)) => c.stop(s),
            (Self::Observable(o), BehaviorState::Observable(s)) => o.stop(s),
            _ => {}
        }
    }

    pub fn persist(&self, state: &BehaviorState) -> PersistedBehavior {
        match (self, state) {
            (Self::Machine(m), BehaviorState::Machine(s)) => machine::persist(m, s),
            (_, BehaviorState::Machine(s)) => PersistedBehavior::Machine {
                configuration: Vec::new(),
                context: s.context.clone(),
                history: Default::default(),
            },
            (_, BehaviorState::Promise(s)) => PersistedBehavior::Promise(s.clone()),
            (_, BehaviorState::Callback(s)) => PersistedBehavior::Callback {
                input: s.input.clone(),
            },
            (_, BehaviorState::Observable(s)) => PersistedBehavior::Observable(s.clone()),
            (_, BehaviorState::Reducer(s)) => PersistedBehavior::Reducer(s.clone()),
        }
    }

    pub fn restore(&self, persisted: &PersistedBehavior) -> Result<BehaviorState, CheckpointError> {
        match (self, persisted) {
            (
                Self::Machine(m),
                PersistedBehavior::Machine {
                    configuration,
                    context,
                    history,
                },
            ) => Ok(BehaviorState::Machine(machine::restore(
                m,
                configuration,
                context,
                history,
            )?)),
            (Self::Promise(_), PersistedBehavior::Promise(s)) => {
                Ok(BehaviorState::Promise(s.clone()))
            }
            (Self::Callback(c), PersistedBehavior::Callback { input }) => {
                Ok(BehaviorState::Callback(c.initial_state(input)))
            }
            (Self::Observable(_), PersistedBehavior::Observable(s)) => {
                Ok(BehaviorState::Observable(s.clone()))
            }
            (Self::Reducer(_), PersistedBehavior::Reducer(s)) => {
                Ok(BehaviorState::Reducer(s.clone()))
            }
            (behavior, persisted) => Err(CheckpointError::BehaviorMismatch {
                expected: behavior.kind(),
                found: persisted.kind(),
            }),
        }
    }
}

impl From<Machine> for Behavior {
    fn from(machine: Machine) -> Self {
        Self::machine(machine)
    }
}
