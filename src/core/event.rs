//! Events delivered to actors.
//!
//! An event is a tagged value: a `type` string plus an arbitrary JSON
//! payload. A handful of types are reserved for lifecycle signals and for
//! the completion events the runtime synthesizes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Start signal delivered to a behavior when its actor starts.
pub const INIT_EVENT: &str = "statecraft.init";

/// Stop signal. Sending it to an actor stops the actor.
pub const STOP_EVENT: &str = "statecraft.stop";

const DONE_ACTOR_PREFIX: &str = "statecraft.done.actor.";
const ERROR_ACTOR_PREFIX: &str = "statecraft.error.actor.";
const DONE_STATE_PREFIX: &str = "statecraft.done.state.";
const AFTER_PREFIX: &str = "statecraft.after.";

/// A tagged event value.
///
/// # Example
///
/// ```rust
/// use statecraft::Event;
/// use serde_json::json;
///
/// let event = Event::with_payload("DEPOSIT", json!({ "amount": 10 }));
/// assert_eq!(event.kind, "DEPOSIT");
/// assert_eq!(event.payload["amount"], 10);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The event type used for transition matching.
    #[serde(rename = "type")]
    pub kind: String,

    /// Free-form data carried by the event.
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// Create an event with a null payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    /// Create an event carrying a payload.
    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn init() -> Self {
        Self::new(INIT_EVENT)
    }

    pub fn stop() -> Self {
        Self::new(STOP_EVENT)
    }

    /// Completion event forwarded to a parent when child `id` finishes.
    pub fn done_actor(id: &str, output: Value) -> Self {
        Self::with_payload(done_actor_type(id), output)
    }

    /// Failure event forwarded to a parent when child `id` errors.
    pub fn error_actor(id: &str, error: &str) -> Self {
        Self::with_payload(error_actor_type(id), Value::String(error.to_string()))
    }

    /// Raised internally when the compound or parallel node `node_id` completes.
    pub fn done_state(node_id: &str, output: Value) -> Self {
        Self::with_payload(done_state_type(node_id), output)
    }

    pub fn is_init(&self) -> bool {
        self.kind == INIT_EVENT
    }

    pub fn is_stop(&self) -> bool {
        self.kind == STOP_EVENT
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)
    }
}

impl From<&str> for Event {
    fn from(kind: &str) -> Self {
        Event::new(kind)
    }
}

pub fn done_actor_type(id: &str) -> String {
    format!("{DONE_ACTOR_PREFIX}{id}")
}

pub fn error_actor_type(id: &str) -> String {
    format!("{ERROR_ACTOR_PREFIX}{id}")
}

pub fn done_state_type(node_id: &str) -> String {
    format!("{DONE_STATE_PREFIX}{node_id}")
}

/// Event type used for the delayed transition of `node_id` after `delay_ms`.
pub fn after_type(delay_ms: u64, node_id: &str) -> String {
    format!("{AFTER_PREFIX}{delay_ms}.{node_id}")
}

/// How a transition selects the events it reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventSelector {
    /// Exactly this event type.
    Exact(String),
    /// `*`: every event.
    Wildcard,
    /// `prefix.*`: the prefix itself and anything below it.
    Partial(String),
}

impl EventSelector {
    /// Parse a descriptor as written in a machine definition.
    pub fn parse(descriptor: &str) -> Self {
        if descriptor == "*" {
            Self::Wildcard
        } else if let Some(prefix) = descriptor.strip_suffix(".*") {
            Self::Partial(prefix.to_string())
        } else {
            Self::Exact(descriptor.to_string())
        }
    }

    pub fn matches(&self, kind: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == kind,
            Self::Wildcard => true,
            Self::Partial(prefix) => {
                kind == prefix
                    || (kind.starts_with(prefix.as_str())
                        && kind[prefix.len()..].starts_with('.'))
            }
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_serializes_with_type_field() {
        let event = Event::with_payload("TIMER", json!(3));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({ "type": "TIMER", "payload": 3 }));
    }

    #[test]
    fn payload_defaults_to_null() {
        let event: Event = serde_json::from_value(json!({ "type": "GO" })).unwrap();
        assert_eq!(event, Event::new("GO"));
    }

    #[test]
    fn reserved_types_are_namespaced() {
        assert_eq!(done_actor_type("fetch"), "statecraft.done.actor.fetch");
        assert_eq!(error_actor_type("fetch"), "statecraft.error.actor.fetch");
        assert_eq!(done_state_type("m.a"), "statecraft.done.state.m.a");
        assert_eq!(after_type(500, "m.a"), "statecraft.after.500.m.a");
        assert!(Event::init().is_init());
        assert!(Event::stop().is_stop());
    }

    #[test]
    fn exact_selector_matches_only_its_type() {
        let selector = EventSelector::parse("TIMER");
        assert!(selector.is_exact());
        assert!(selector.matches("TIMER"));
        assert!(!selector.matches("TIMER.fast"));
    }

    #[test]
    fn wildcard_selector_matches_everything() {
        let selector = EventSelector::parse("*");
        assert!(selector.matches("anything"));
        assert!(!selector.is_exact());
    }

    #[test]
    fn partial_selector_matches_descendant_types() {
        let selector = EventSelector::parse("mouse.*");
        assert!(selector.matches("mouse"));
        assert!(selector.matches("mouse.click"));
        assert!(selector.matches("mouse.click.double"));
        assert!(!selector.matches("mousetrap"));
        assert!(!selector.matches("keyboard"));
    }
}
