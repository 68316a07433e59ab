//! Guard predicates for controlling transitions.
//!
//! Guards are pure boolean functions of the actor's context and the event
//! being processed. They decide whether a candidate transition is enabled
//! and must not have side effects: the resolver may evaluate them any
//! number of times.

use super::event::Event;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&Value, &Event) -> Result<bool, String> + Send + Sync;

/// Pure predicate that determines if a transition is enabled.
///
/// # Example
///
/// ```rust
/// use statecraft::{Event, Guard};
/// use serde_json::json;
///
/// let has_funds = Guard::new(|ctx, event| {
///     ctx["balance"].as_i64().unwrap_or(0) >= event.payload["amount"].as_i64().unwrap_or(0)
/// });
///
/// let withdraw = Event::with_payload("WITHDRAW", json!({ "amount": 30 }));
/// assert!(has_funds.check(&json!({ "balance": 50 }), &withdraw).unwrap());
/// assert!(!has_funds.check(&json!({ "balance": 10 }), &withdraw).unwrap());
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<Predicate>,
}

impl Guard {
    /// Create a guard from an infallible predicate.
    ///
    /// The predicate must be deterministic and thread-safe.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Value, &Event) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(move |ctx, event| Ok(predicate(ctx, event))),
        }
    }

    /// Create a guard that may fail, e.g. when the context is malformed.
    ///
    /// A failing guard is a fault: it terminates the step and moves the
    /// actor to the errored state.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&Value, &Event) -> Result<bool, String> + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the guard against a context and an event.
    pub fn check(&self, context: &Value, event: &Event) -> Result<bool, String> {
        (self.predicate)(context, event)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guard_allows_matching_context() {
        let guard = Guard::new(|ctx, _| ctx["ready"] == json!(true));

        assert!(guard.check(&json!({ "ready": true }), &Event::new("GO")).unwrap());
        assert!(!guard.check(&json!({ "ready": false }), &Event::new("GO")).unwrap());
    }

    #[test]
    fn guard_can_inspect_event_payload() {
        let guard = Guard::new(|_, event| event.payload.as_u64() == Some(7));

        assert!(guard
            .check(&Value::Null, &Event::with_payload("PICK", json!(7)))
            .unwrap());
        assert!(!guard
            .check(&Value::Null, &Event::with_payload("PICK", json!(8)))
            .unwrap());
    }

    #[test]
    fn guard_is_deterministic() {
        let context = json!({ "count": 3 });
        let event = Event::new("INC");
        let guard = Guard::new(|ctx, _| ctx["count"].as_i64().unwrap_or(0) < 5);

        let result1 = guard.check(&context, &event).unwrap();
        let result2 = guard.check(&context, &event).unwrap();

        assert_eq!(result1, result2);
        assert_eq!(context, json!({ "count": 3 }));
    }

    #[test]
    fn fallible_guard_reports_errors() {
        let guard = Guard::fallible(|ctx, _| {
            ctx["limit"]
                .as_i64()
                .map(|limit| limit > 0)
                .ok_or_else(|| "limit missing".to_string())
        });

        assert_eq!(guard.check(&json!({ "limit": 1 }), &Event::new("X")), Ok(true));
        assert_eq!(
            guard.check(&json!({}), &Event::new("X")),
            Err("limit missing".to_string())
        );
    }

    #[test]
    fn cloned_guards_share_the_predicate() {
        let guard = Guard::new(|ctx, _| ctx.is_object());
        let cloned = guard.clone();

        assert_eq!(
            guard.check(&json!({}), &Event::new("X")),
            cloned.check(&json!({}), &Event::new("X"))
        );
    }
}
