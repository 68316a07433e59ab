//! Actors driven by a pure `(state, event) -> state` function.

use crate::core::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type ReduceFn = dyn Fn(&Value, &Event) -> Value + Send + Sync;

#[derive(Clone)]
pub struct ReducerLogic {
    initial: Value,
    reduce: Arc<ReduceFn>,
}

impl ReducerLogic {
    pub fn new<F>(initial: Value, reduce: F) -> Self
    where
        F: Fn(&Value, &Event) -> Value + Send + Sync + 'static,
    {
        Self {
            initial,
            reduce: Arc::new(reduce),
        }
    }

    /// A non-null input replaces the declared initial state.
    pub(crate) fn initial_state(&self, input: &Value) -> ReducerState {
        let state = if input.is_null() {
            self.initial.clone()
        } else {
            input.clone()
        };
        ReducerState { state }
    }

    pub(crate) fn transition(&self, state: &ReducerState, event: &Event) -> ReducerState {
        ReducerState {
            state: (self.reduce)(&state.state, event),
        }
    }
}

impl fmt::Debug for ReducerLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerLogic")
            .field("initial", &self.initial)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReducerState {
    pub state: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter() -> ReducerLogic {
        ReducerLogic::new(json!(0), |state, event| match event.kind.as_str() {
            "INC" => json!(state.as_i64().unwrap_or(0) + 1),
            _ => state.clone(),
        })
    }

    #[test]
    fn reduces_events() {
        let logic = counter();
        let state = logic.initial_state(&Value::Null);
        let state = logic.transition(&state, &Event::new("INC"));
        let state = logic.transition(&state, &Event::new("NOOP"));
        assert_eq!(state.state, json!(1));
    }

    #[test]
    fn input_replaces_initial_state() {
        assert_eq!(counter().initial_state(&json!(10)).state, json!(10));
    }
}
