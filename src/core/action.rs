//! Actions attached to transitions and to state entry/exit.
//!
//! Two kinds of user code can run during a step:
//!
//! - **Assigners** compute a new context from the current one. They are
//!   pure and run inside the resolver, so later guards see their result.
//! - **Effectful actions** touch the outside world. The resolver never runs
//!   them; it emits an [`Effect::Execute`](super::effect::Effect) that the
//!   owning actor applies after the step has been resolved.
//!
//! Everything else (raising events, sending to the parent, spawning and
//! stopping children) is a built-in action with a declarative form.

use super::event::Event;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type AssignFn = dyn Fn(&Value, &Event) -> Result<Value, String> + Send + Sync;
type ExecuteFn = dyn Fn(&ActionArgs<'_>) -> Result<(), String> + Send + Sync;

/// Pure context update.
#[derive(Clone)]
pub struct Assigner {
    update: Arc<AssignFn>,
}

impl Assigner {
    pub fn new<F>(update: F) -> Self
    where
        F: Fn(&Value, &Event) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            update: Arc::new(update),
        }
    }

    pub fn apply(&self, context: &Value, event: &Event) -> Result<Value, String> {
        (self.update)(context, event)
    }
}

/// Arguments handed to an effectful action when the actor executes it.
#[derive(Debug)]
pub struct ActionArgs<'a> {
    /// Id of the actor running the action.
    pub actor_id: &'a str,
    /// Context as it was when the action was reached during the step.
    pub context: &'a Value,
    /// The event that triggered the step.
    pub event: &'a Event,
}

/// Side-effecting action, executed by the actor after resolution.
#[derive(Clone)]
pub struct EffectAction {
    run: Arc<ExecuteFn>,
}

impl EffectAction {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&ActionArgs<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run) }
    }

    pub fn execute(&self, args: &ActionArgs<'_>) -> Result<(), String> {
        (self.run)(args)
    }
}

/// Named implementation registered on a machine builder.
#[derive(Clone)]
pub enum NamedAction {
    Assign(Assigner),
    Effect(EffectAction),
}

/// A compiled action, ready for the resolver.
#[derive(Clone)]
pub enum Action {
    /// Replace the context with the assigner's result.
    Assign { name: String, assigner: Assigner },
    /// Shallow-merge a static object into the context.
    Patch(serde_json::Map<String, Value>),
    /// Run a side effect after resolution.
    Execute { name: String, action: EffectAction },
    /// Queue an internal event, processed within the current macrostep.
    Raise(Event),
    /// Append an event to the parent's mailbox.
    SendParent(Event),
    /// Append an event to a child's mailbox.
    SendTo { to: String, event: Event },
    /// Spawn a child actor from a registered source.
    Spawn { id: String, src: String, input: Value },
    /// Stop a child actor.
    Stop { id: String },
    /// Emit a log line through `tracing`.
    Log { message: String },
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign { name, .. } => write!(f, "Assign({name})"),
            Self::Patch(patch) => write!(f, "Patch({})", Value::Object(patch.clone())),
            Self::Execute { name, .. } => write!(f, "Execute({name})"),
            Self::Raise(event) => write!(f, "Raise({event})"),
            Self::SendParent(event) => write!(f, "SendParent({event})"),
            Self::SendTo { to, event } => write!(f, "SendTo({to}, {event})"),
            Self::Spawn { id, src, .. } => write!(f, "Spawn({id} <- {src})"),
            Self::Stop { id } => write!(f, "Stop({id})"),
            Self::Log { message } => write!(f, "Log({message})"),
        }
    }
}

/// Merge the top-level keys of `patch` into an object context.
///
/// A non-object context is replaced by the patch.
pub fn merge_patch(context: &Value, patch: &serde_json::Map<String, Value>) -> Value {
    let mut merged = match context {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assigner_returns_new_context() {
        let increment = Assigner::new(|ctx, _| {
            let count = ctx["count"].as_i64().unwrap_or(0);
            Ok(json!({ "count": count + 1 }))
        });

        let before = json!({ "count": 1 });
        let after = increment.apply(&before, &Event::new("INC")).unwrap();

        assert_eq!(after, json!({ "count": 2 }));
        assert_eq!(before, json!({ "count": 1 }));
    }

    #[test]
    fn patch_merges_top_level_keys() {
        let patch = json!({ "b": 2, "c": 3 });
        let merged = merge_patch(&json!({ "a": 1, "b": 0 }), patch.as_object().unwrap());
        assert_eq!(merged, json!({ "a": 1, "b": 2, "c": 3 }));
    }

    #[test]
    fn patch_replaces_non_object_context() {
        let patch = json!({ "a": 1 });
        let merged = merge_patch(&Value::Null, patch.as_object().unwrap());
        assert_eq!(merged, json!({ "a": 1 }));
    }

    #[test]
    fn effect_action_receives_arguments() {
        let action = EffectAction::new(|args| {
            if args.event.kind == "FAIL" {
                Err(format!("{} refused", args.actor_id))
            } else {
                Ok(())
            }
        });
        let context = json!({});

        let ok = action.execute(&ActionArgs {
            actor_id: "worker",
            context: &context,
            event: &Event::new("GO"),
        });
        let err = action.execute(&ActionArgs {
            actor_id: "worker",
            context: &context,
            event: &Event::new("FAIL"),
        });

        assert!(ok.is_ok());
        assert_eq!(err, Err("worker refused".to_string()));
    }
}
