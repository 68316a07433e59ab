//! Actors wrapping a single asynchronous operation.

use crate::actor::{ActorError, ActorScope};
use crate::core::{Effect, Event};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub(crate) const RESOLVE_EVENT: &str = "statecraft.promise.resolve";
pub(crate) const REJECT_EVENT: &str = "statecraft.promise.reject";

type PromiseFn = dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync;

/// Factory producing the operation from the actor's input.
#[derive(Clone)]
pub struct PromiseLogic {
    create: Arc<PromiseFn>,
}

impl PromiseLogic {
    pub fn new<F, Fut>(create: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        Self {
            create: Arc::new(move |input| create(input).boxed()),
        }
    }

    pub(crate) fn initial_state(&self, input: &Value) -> PromiseState {
        PromiseState {
            status: PromiseStatus::Pending,
            input: input.clone(),
            output: None,
            error: None,
            canceled: false,
        }
    }

    /// Run the operation; its settlement comes back as an event.
    pub(crate) fn start(
        &self,
        state: &PromiseState,
        scope: &mut ActorScope<'_>,
    ) -> Result<PromiseState, ActorError> {
        if state.status != PromiseStatus::Pending || state.canceled {
            return Ok(state.clone());
        }
        let sender = scope.sender();
        let operation = (self.create)(state.input.clone());
        scope.spawn(async move {
            let settlement = match operation.await {
                Ok(value) => Event::with_payload(RESOLVE_EVENT, value),
                Err(error) => Event::with_payload(REJECT_EVENT, Value::String(error)),
            };
            sender.send(settlement);
        })?;
        Ok(state.clone())
    }

    pub(crate) fn transition(
        &self,
        state: &PromiseState,
        event: &Event,
        scope: &mut ActorScope<'_>,
    ) -> PromiseState {
        if state.canceled || state.status != PromiseStatus::Pending {
            return state.clone();
        }
        match event.kind.as_str() {
            RESOLVE_EVENT => {
                scope.emit(Effect::Done {
                    output: event.payload.clone(),
                });
                PromiseState {
                    status: PromiseStatus::Resolved,
                    output: Some(event.payload.clone()),
                    ..state.clone()
                }
            }
            REJECT_EVENT => {
                let error = match &event.payload {
                    Value::String(message) => message.clone(),
                    other => other.to_string(),
                };
                scope.emit(Effect::Failed {
                    error: error.clone(),
                });
                PromiseState {
                    status: PromiseStatus::Rejected,
                    error: Some(error),
                    ..state.clone()
                }
            }
            _ => state.clone(),
        }
    }

    pub(crate) fn stop(&self, state: &mut PromiseState) {
        state.canceled = true;
    }
}

impl fmt::Debug for PromiseLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PromiseLogic")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseStatus {
    Pending,
    Resolved,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromiseState {
    pub status: PromiseStatus,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the actor is stopped; late settlements are ignored.
    #[serde(default)]
    pub canceled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Address, CancelToken};
    use crate::actor::reference::Postbox;
    use serde_json::json;

    fn with_scope<R>(f: impl FnOnce(&mut ActorScope<'_>) -> R) -> (R, Vec<Effect>) {
        let (postbox, _inbox) = Postbox::channel();
        let address = Address::root("fetch");
        let token = CancelToken::new();
        let mut scope = ActorScope {
            id: "fetch",
            address: &address,
            parent: None,
            postbox: &postbox,
            token: &token,
            effects: Vec::new(),
        };
        let result = f(&mut scope);
        (result, scope.into_effects())
    }

    fn logic() -> PromiseLogic {
        PromiseLogic::new(|input| async move { Ok(input) })
    }

    #[test]
    fn resolve_finishes_with_value() {
        let logic = logic();
        let state = logic.initial_state(&json!(1));

        let (next, effects) =
            with_scope(|scope| logic.transition(&state, &Event::with_payload(RESOLVE_EVENT, json!(42)), scope));

        assert_eq!(next.status, PromiseStatus::Resolved);
        assert_eq!(next.output, Some(json!(42)));
        assert!(matches!(&effects[..], [Effect::Done { output }] if output == &json!(42)));
    }

    #[test]
    fn reject_fails_with_message() {
        let logic = logic();
        let state = logic.initial_state(&Value::Null);

        let (next, effects) = with_scope(|scope| {
            logic.transition(&state, &Event::with_payload(REJECT_EVENT, json!("timeout")), scope)
        });

        assert_eq!(next.status, PromiseStatus::Rejected);
        assert_eq!(next.error.as_deref(), Some("timeout"));
        assert!(matches!(&effects[..], [Effect::Failed { error }] if error == "timeout"));
    }

    #[test]
    fn canceled_promise_ignores_settlement() {
        let logic = logic();
        let mut state = logic.initial_state(&Value::Null);
        logic.stop(&mut state);

        let (next, effects) =
            with_scope(|scope| logic.transition(&state, &Event::with_payload(RESOLVE_EVENT, json!(1)), scope));

        assert_eq!(next, state);
        assert!(effects.is_empty());
    }
}
