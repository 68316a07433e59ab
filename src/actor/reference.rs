//! Addresses and handles for reaching actors.
//!
//! Actors never hold references to each other. A parent owns its children;
//! everything else (a child's parent, timers, async tasks, external
//! callers) reaches an actor through its [`Address`] by posting an
//! [`Envelope`] to the root's inbox. The root delivers envelopes on its own
//! thread, so every actor still processes one event at a time.

use super::observer::{Observer, Observers, Subscription};
use super::scope::CancelToken;
use super::snapshot::Snapshot;
use crate::core::Event;
use std::fmt;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Path of an actor from the root of its tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(Vec<String>);

impl Address {
    pub fn root(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut path = self.0.clone();
        path.push(id.into());
        Self(path)
    }

    /// Id of the addressed actor.
    pub fn id(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// An event in transit to an actor.
///
/// Envelopes posted by async work carry the token of whatever posted them.
/// If that token is cancelled by the time the envelope is delivered, the
/// event is dropped, even when a new actor now lives at the same address.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub to: Address,
    pub event: Event,
    pub(crate) token: Option<CancelToken>,
}

impl Envelope {
    /// Whether the work that posted this envelope has since been cancelled.
    pub fn is_stale(&self) -> bool {
        self.token.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Sending half of a root actor's inbox, shared by its whole tree.
#[derive(Clone, Debug)]
pub(crate) struct Postbox {
    sender: mpsc::UnboundedSender<Envelope>,
}

impl Postbox {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Post an envelope. Returns false once the root is gone.
    pub(crate) fn post(&self, to: Address, event: Event, token: Option<CancelToken>) -> bool {
        self.sender.send(Envelope { to, event, token }).is_ok()
    }
}

/// Posts events to one actor from outside its processing loop.
///
/// Handed to timers, async tasks and callback producers. Once the owning
/// actor is stopped the sender goes inert and every send is dropped.
#[derive(Clone, Debug)]
pub struct EventSender {
    to: Option<Address>,
    postbox: Postbox,
    token: CancelToken,
}

impl EventSender {
    pub(crate) fn new(to: Option<Address>, postbox: Postbox, token: CancelToken) -> Self {
        Self { to, postbox, token }
    }

    /// Send an event. Returns whether it was posted.
    pub fn send(&self, event: impl Into<Event>) -> bool {
        let event = event.into();
        if self.token.is_cancelled() {
            debug!(event = %event.kind, "sender is inert, dropping event");
            return false;
        }
        match &self.to {
            Some(to) => self
                .postbox
                .post(to.clone(), event, Some(self.token.clone())),
            None => {
                debug!(event = %event.kind, "no recipient, dropping event");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.to.is_none()
    }
}

/// Cloneable handle to a running actor.
///
/// A reference can post events and observe snapshots but cannot touch the
/// actor's state directly. Posted events are delivered when the owning root
/// actor next processes its inbox (`send`, `flush` or `wait_for`).
#[derive(Clone)]
pub struct ActorRef {
    address: Address,
    postbox: Postbox,
    snapshots: watch::Receiver<Snapshot>,
    observers: Observers,
}

impl ActorRef {
    pub(crate) fn new(
        address: Address,
        postbox: Postbox,
        snapshots: watch::Receiver<Snapshot>,
        observers: Observers,
    ) -> Self {
        Self {
            address,
            postbox,
            snapshots,
            observers,
        }
    }

    pub fn id(&self) -> &str {
        self.address.id()
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn send(&self, event: impl Into<Event>) {
        let event = event.into();
        if !self.postbox.post(self.address.clone(), event, None) {
            debug!(actor = %self.address, "actor system is gone, dropping event");
        }
    }

    /// The last snapshot the actor published.
    pub fn get_snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self, observer: impl Observer + 'static) -> Subscription {
        self.observers.subscribe(observer)
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_addresses_extend_the_path() {
        let root = Address::root("app");
        let child = root.child("fetch").child("retry");

        assert_eq!(child.id(), "retry");
        assert_eq!(child.to_string(), "app/fetch/retry");
        assert_eq!(child.segments().len(), 3);
    }

    #[test]
    fn sender_goes_inert_after_cancel() {
        let (postbox, mut inbox) = Postbox::channel();
        let token = CancelToken::new();
        let sender = EventSender::new(Some(Address::root("app")), postbox, token.clone());

        assert!(sender.send("PING"));
        token.cancel();
        assert!(!sender.send("PING"));
        assert!(sender.is_closed());

        let delivered = inbox.try_recv().unwrap();
        assert_eq!(delivered.event.kind, "PING");
        assert!(inbox.try_recv().is_err());
    }

    #[test]
    fn envelopes_go_stale_when_their_sender_is_cancelled() {
        let (postbox, mut inbox) = Postbox::channel();
        let token = CancelToken::new();
        let sender = EventSender::new(Some(Address::root("app")), postbox.clone(), token.clone());

        assert!(sender.send("DONE"));
        assert!(postbox.post(Address::root("app"), Event::new("PING"), None));
        token.cancel();

        let posted = inbox.try_recv().unwrap();
        assert_eq!(posted.event.kind, "DONE");
        assert!(posted.is_stale());

        let external = inbox.try_recv().unwrap();
        assert!(!external.is_stale());
    }

    #[test]
    fn sender_without_recipient_drops() {
        let (postbox, _inbox) = Postbox::channel();
        let sender = EventSender::new(None, postbox, CancelToken::new());
        assert!(!sender.send("PING"));
    }
}
