//! Externally visible projection of an actor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    NotStarted,
    Running,
    /// Stopped, or finished with an output.
    Stopped,
    /// Terminated by a fault.
    Errored,
}

impl ActorStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Errored)
    }
}

/// What observers see after every processed event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: ActorStatus,
    /// State value: a nested tree of active state keys for machines, the
    /// latest value for other behaviors.
    pub value: Value,
    pub context: Value,
    /// Ids of live children, in spawn order.
    pub children: Vec<String>,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl Snapshot {
    pub(crate) fn not_started() -> Self {
        Self {
            status: ActorStatus::NotStarted,
            value: Value::Null,
            context: Value::Null,
            children: Vec::new(),
            output: None,
            error: None,
        }
    }

    /// Test the state value against a dotted path.
    ///
    /// `"a"` matches both `"a"` and `{ "a": "b" }`; `"a.b"` matches only the
    /// latter. For parallel states each region is one key of the object.
    ///
    /// ```rust
    /// # use statecraft::actor::{ActorStatus, Snapshot};
    /// # use serde_json::json;
    /// let snapshot = Snapshot {
    ///     status: ActorStatus::Running,
    ///     value: json!({ "walk": { "signal": "flashing" } }),
    ///     context: json!({}),
    ///     children: vec![],
    ///     output: None,
    ///     error: None,
    /// };
    /// assert!(snapshot.matches("walk"));
    /// assert!(snapshot.matches("walk.signal.flashing"));
    /// assert!(!snapshot.matches("walk.signal.solid"));
    /// ```
    pub fn matches(&self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('.').collect();
        let mut current = &self.value;
        for (i, key) in segments.iter().enumerate() {
            match current {
                Value::String(state) => return state == key && i + 1 == segments.len(),
                Value::Object(map) => match map.get(*key) {
                    Some(next) => current = next,
                    None => return false,
                },
                _ => return false,
            }
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.status == ActorStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_value(value: Value) -> Snapshot {
        Snapshot {
            value,
            ..Snapshot::not_started()
        }
    }

    #[test]
    fn matches_atomic_value() {
        let snapshot = with_value(json!("green"));
        assert!(snapshot.matches("green"));
        assert!(!snapshot.matches("red"));
        assert!(!snapshot.matches("green.fast"));
    }

    #[test]
    fn matches_parallel_regions() {
        let snapshot = with_value(json!({ "left": "on", "right": "off" }));
        assert!(snapshot.matches("left.on"));
        assert!(snapshot.matches("right.off"));
        assert!(!snapshot.matches("right.on"));
    }

    #[test]
    fn null_value_matches_nothing() {
        assert!(!with_value(Value::Null).matches("anything"));
    }

    #[test]
    fn status_serializes_in_snake_case() {
        assert_eq!(
            serde_json::to_value(ActorStatus::NotStarted).unwrap(),
            json!("not_started")
        );
        assert!(ActorStatus::Errored.is_terminal());
        assert!(!ActorStatus::Running.is_terminal());
    }
}
