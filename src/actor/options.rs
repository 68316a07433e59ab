//! Options for creating a root actor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a root actor is created.
///
/// ```rust
/// use statecraft::actor::ActorOptions;
/// use serde_json::json;
///
/// let options: ActorOptions = serde_json::from_value(json!({ "id": "order-1" })).unwrap();
/// assert_eq!(options.id.as_deref(), Some("order-1"));
/// assert!(options.input.is_null());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorOptions {
    /// Actor id. Defaults to the machine id, or the behavior kind.
    pub id: Option<String>,

    /// Handed to the behavior's initial state. For machines an object input
    /// is merged over the declared context.
    pub input: Value,
}

impl ActorOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }
}
