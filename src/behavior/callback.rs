//! Actors bridging external, callback-style producers.
//!
//! A callback actor runs a setup function once at start. The setup gets a
//! [`CallbackScope`]: it can grab an [`EventSender`] that delivers to the
//! parent (safe to move into threads or tasks; it goes inert once the actor
//! stops), and register listeners for events sent to the actor. It may
//! return a [`Disposer`], run exactly once when the actor stops.

use crate::actor::{ActorScope, EventSender};
use crate::core::Event;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type SetupFn = dyn Fn(&mut CallbackScope) -> Option<Disposer> + Send + Sync;
type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Cleanup returned by a callback setup.
pub struct Disposer(Box<dyn FnOnce() + Send>);

impl Disposer {
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(dispose))
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Disposer")
    }
}

/// Handed to the setup function.
pub struct CallbackScope {
    input: Value,
    sender: EventSender,
    listeners: Vec<Listener>,
}

impl CallbackScope {
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Sender delivering events to the parent actor.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Call `listener` for every event sent to this actor.
    pub fn on_receive(&mut self, listener: impl Fn(&Event) + Send + Sync + 'static) {
        self.listeners.push(Arc::new(listener));
    }
}

#[derive(Clone)]
pub struct CallbackLogic {
    setup: Arc<SetupFn>,
}

impl CallbackLogic {
    pub fn new<F>(setup: F) -> Self
    where
        F: Fn(&mut CallbackScope) -> Option<Disposer> + Send + Sync + 'static,
    {
        Self {
            setup: Arc::new(setup),
        }
    }

    pub(crate) fn initial_state(&self, input: &Value) -> CallbackState {
        CallbackState {
            input: input.clone(),
            listeners: Vec::new(),
            disposer: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn start(&self, state: &CallbackState, scope: &ActorScope<'_>) -> CallbackState {
        let mut setup_scope = CallbackScope {
            input: state.input.clone(),
            sender: scope.parent_sender(),
            listeners: Vec::new(),
        };
        let disposer = (self.setup)(&mut setup_scope);
        CallbackState {
            input: state.input.clone(),
            listeners: setup_scope.listeners,
            disposer: Arc::new(Mutex::new(disposer)),
        }
    }

    pub(crate) fn transition(&self, state: &CallbackState, event: &Event) -> CallbackState {
        for listener in &state.listeners {
            listener(event);
        }
        state.clone()
    }

    /// Run the disposer, if it has not run yet.
    pub(crate) fn stop(&self, state: &mut CallbackState) {
        let disposer = state
            .disposer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Disposer(dispose)) = disposer {
            dispose();
        }
        state.listeners.clear();
    }
}

impl fmt::Debug for CallbackLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallbackLogic")
    }
}

/// Live state of a callback actor. Only `input` survives persistence.
#[derive(Clone)]
pub struct CallbackState {
    pub input: Value,
    listeners: Vec<Listener>,
    disposer: Arc<Mutex<Option<Disposer>>>,
}

impl fmt::Debug for CallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackState")
            .field("input", &self.input)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
