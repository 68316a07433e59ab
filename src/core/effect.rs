//! Ordered effects returned by a resolution step.
//!
//! The resolver is pure: instead of touching the world it returns a list of
//! effects in the order the statechart semantics require (exit, transition,
//! entry). The actor applies them one by one after the step.

use super::action::EffectAction;
use super::event::Event;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

#[derive(Clone)]
pub enum Effect {
    /// Run a user action with the context captured at that point of the step.
    Execute {
        name: String,
        action: EffectAction,
        context: Value,
        event: Event,
    },
    Log { message: String, context: Value },
    SendParent(Event),
    SendTo { to: String, event: Event },
    Spawn { id: String, src: String, input: Value },
    Stop { id: String },
    /// Deliver `event` to the actor itself after `delay`, unless cancelled.
    Schedule {
        id: String,
        delay: Duration,
        event: Event,
    },
    Cancel { id: String },
    /// The behavior reached its final state with this output.
    Done { output: Value },
    /// The behavior failed; forwarded to the parent as an ordinary event.
    Failed { error: String },
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute { name, event, .. } => write!(f, "Execute({name}, {event})"),
            Self::Log { message, .. } => write!(f, "Log({message})"),
            Self::SendParent(event) => write!(f, "SendParent({event})"),
            Self::SendTo { to, event } => write!(f, "SendTo({to}, {event})"),
            Self::Spawn { id, src, .. } => write!(f, "Spawn({id} <- {src})"),
            Self::Stop { id } => write!(f, "Stop({id})"),
            Self::Schedule { id, delay, .. } => write!(f, "Schedule({id}, {delay:?})"),
            Self::Cancel { id } => write!(f, "Cancel({id})"),
            Self::Done { output } => write!(f, "Done({output})"),
            Self::Failed { error } => write!(f, "Failed({error})"),
        }
    }
}

impl Effect {
    /// Short label used in logs and tests.
    pub fn label(&self) -> String {
        format!("{self:?}")
    }
}
