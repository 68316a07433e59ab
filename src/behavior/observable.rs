//! Actors wrapping a push stream of values.

use crate::actor::{ActorError, ActorScope};
use crate::core::{Effect, Event};
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub(crate) const NEXT_EVENT: &str = "statecraft.observable.next";
pub(crate) const COMPLETE_EVENT: &str = "statecraft.observable.complete";
pub(crate) const ERROR_EVENT: &str = "statecraft.observable.error";

type StreamFn = dyn Fn(Value) -> BoxStream<'static, Result<Value, String>> + Send + Sync;

/// Factory producing the stream from the actor's input.
#[derive(Clone)]
pub struct ObservableLogic {
    create: Arc<StreamFn>,
}

impl ObservableLogic {
    pub fn new<F, S>(create: F) -> Self
    where
        F: Fn(Value) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Value, String>> + Send + 'static,
    {
        Self {
            create: Arc::new(move |input| create(input).boxed()),
        }
    }

    pub(crate) fn initial_state(&self, input: &Value) -> ObservableState {
        ObservableState {
            status: ObservableStatus::Active,
            input: input.clone(),
            value: None,
            error: None,
            canceled: false,
        }
    }

    /// Subscribe to the stream. Items come back as events until the stream
    /// ends, fails, or the actor stops.
    pub(crate) fn start(
        &self,
        state: &ObservableState,
        scope: &mut ActorScope<'_>,
    ) -> Result<ObservableState, ActorError> {
        if state.status != ObservableStatus::Active || state.canceled {
            return Ok(state.clone());
        }
        let sender = scope.sender();
        let mut stream = (self.create)(state.input.clone());
        scope.spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(value) => {
                        if !sender.send(Event::with_payload(NEXT_EVENT, value)) {
                            return;
                        }
                    }
                    Err(error) => {
                        sender.send(Event::with_payload(ERROR_EVENT, Value::String(error)));
                        return;
                    }
                }
            }
            sender.send(Event::new(COMPLETE_EVENT));
        })?;
        Ok(state.clone())
    }

    pub(crate) fn transition(
        &self,
        state: &ObservableState,
        event: &Event,
        scope: &mut ActorScope<'_>,
    ) -> ObservableState {
        if state.canceled || state.status != ObservableStatus::Active {
            return state.clone();
        }
        match event.kind.as_str() {
            NEXT_EVENT => ObservableState {
                value: Some(event.payload.clone()),
                ..state.clone()
            },
            COMPLETE_EVENT => {
                scope.emit(Effect::Done {
                    output: state.value.clone().unwrap_or(Value::Null),
                });
                ObservableState {
                    status: ObservableStatus::Completed,
                    ..state.clone()
                }
            }
            ERROR_EVENT => {
                let error = match &event.payload {
                    Value::String(message) => message.clone(),
                    other => other.to_string(),
                };
                scope.emit(Effect::Failed {
                    error: error.clone(),
                });
                ObservableState {
                    status: ObservableStatus::Errored,
                    error: Some(error),
                    ..state.clone()
                }
            }
            _ => state.clone(),
        }
    }

    pub(crate) fn stop(&self, state: &mut ObservableState) {
        state.canceled = true;
    }
}

impl fmt::Debug for ObservableLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObservableLogic")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservableStatus {
    Active,
    Completed,
    Errored,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservableState {
    pub status: ObservableStatus,
    #[serde(default)]
    pub input: Value,
    /// Latest item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub canceled: bool,
}
