//! Running behaviors: actors, their mailboxes and their children.
//!
//! An [`Actor`] owns one behavior instance, a FIFO mailbox, its children and
//! its subscribers. Events are processed one at a time: the behavior
//! transitions, the resulting effects are applied, the new state is
//! committed, and a snapshot is published. Events produced while
//! processing are appended to a mailbox, never handled inline.
//!
//! Asynchronous work (timers, promises, streams, callback producers) runs
//! as tokio tasks that post [`Envelope`]s into the root actor's inbox. The
//! root drains that inbox on [`Actor::send`], [`Actor::flush`] and
//! [`Actor::wait_for`], so all state changes happen on the owning thread.
//!
//! # Example
//!
//! ```rust
//! use statecraft::{Actor, ActorOptions, Machine, MachineConfig};
//! use serde_json::json;
//!
//! let config: MachineConfig = serde_json::from_value(json!({
//!     "id": "toggle",
//!     "initial": "off",
//!     "states": {
//!         "off": { "on": { "FLIP": "on" } },
//!         "on": { "on": { "FLIP": "off" } }
//!     }
//! })).unwrap();
//!
//! let mut actor = Actor::new(Machine::builder(config).build().unwrap(), ActorOptions::default());
//! actor.start().unwrap();
//! actor.send("FLIP");
//! assert!(actor.get_snapshot().matches("on"));
//! ```

mod error;
pub mod observer;
mod options;
pub mod reference;
mod scope;
mod snapshot;

pub use error::ActorError;
pub use observer::{Observer, Subscription};
pub use options::ActorOptions;
pub use reference::{ActorRef, Address, Envelope, EventSender};
pub use scope::{ActorScope, CancelToken};
pub use snapshot::{ActorStatus, Snapshot};

use crate::behavior::{Behavior, BehaviorState};
use crate::checkpoint::{ActorMetadata, CheckpointError, PersistedState, CHECKPOINT_VERSION};
use crate::core::{ActionArgs, Effect, Event};
use indexmap::IndexMap;
use observer::Observers;
use reference::Postbox;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// What applying a step's effects asks the actor to do next.
enum Outcome {
    Continue,
    Done(Value),
    Failed(String),
}

/// A running instance of a [`Behavior`].
pub struct Actor {
    id: String,
    address: Address,
    parent: Option<Address>,
    src: Option<String>,
    input: Value,
    behavior: Behavior,
    state: BehaviorState,
    status: ActorStatus,
    /// Whether live resources (timers, tasks) have been set up. A restored
    /// actor is `Running` but not provisioned until started.
    provisioned: bool,
    mailbox: VecDeque<Event>,
    children: IndexMap<String, Actor>,
    /// Events for the parent, collected by it after each round.
    outbox: Vec<Event>,
    /// One token per pending delay, cancelled when the delay is cleared.
    timers: HashMap<String, CancelToken>,
    token: CancelToken,
    postbox: Postbox,
    /// Present on the root only.
    inbox: Option<mpsc::UnboundedReceiver<Envelope>>,
    observers: Observers,
    snapshots: watch::Sender<Snapshot>,
    output: Option<Value>,
    error: Option<String>,
    metadata: ActorMetadata,
}

impl Actor {
    /// Create a root actor. Nothing runs until [`start`](Self::start).
    pub fn new(behavior: impl Into<Behavior>, options: ActorOptions) -> Self {
        let behavior = behavior.into();
        let id = options.id.unwrap_or_else(|| behavior.default_id());
        let (postbox, inbox) = Postbox::channel();
        Self::build(
            behavior,
            Address::root(id),
            None,
            None,
            options.input,
            postbox,
            Some(inbox),
        )
    }

    fn build(
        behavior: Behavior,
        address: Address,
        parent: Option<Address>,
        src: Option<String>,
        input: Value,
        postbox: Postbox,
        inbox: Option<mpsc::UnboundedReceiver<Envelope>>,
    ) -> Self {
        let state = behavior.initial_state(&input);
        let (snapshots, _) = watch::channel(Snapshot::not_started());
        Self {
            id: address.id().to_string(),
            address,
            parent,
            src,
            input,
            behavior,
            state,
            status: ActorStatus::NotStarted,
            provisioned: false,
            mailbox: VecDeque::new(),
            children: IndexMap::new(),
            outbox: Vec::new(),
            timers: HashMap::new(),
            token: CancelToken::new(),
            postbox,
            inbox,
            observers: Observers::default(),
            snapshots,
            output: None,
            error: None,
            metadata: ActorMetadata::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn status(&self) -> ActorStatus {
        self.status
    }

    /// Start the actor, or re-provision a restored one.
    ///
    /// Publishes the first snapshot, then processes events sent before
    /// start. Returns the fault if starting put the actor in `Errored`.
    pub fn start(&mut self) -> Result<(), ActorError> {
        let result = match self.status {
            ActorStatus::NotStarted => {
                info!(actor = %self.address, behavior = self.behavior.kind(), "starting actor");
                self.status = ActorStatus::Running;
                self.provisioned = true;
                self.step(|behavior, state, scope| behavior.start(state, scope))
            }
            ActorStatus::Running if !self.provisioned => {
                info!(actor = %self.address, "resuming restored actor");
                self.provisioned = true;
                self.resume()
            }
            ActorStatus::Running => {
                return Err(ActorError::AlreadyStarted {
                    actor: self.address.to_string(),
                })
            }
            ActorStatus::Stopped | ActorStatus::Errored => {
                return Err(ActorError::Terminated {
                    actor: self.address.to_string(),
                })
            }
        };

        let fault = result.as_ref().err().cloned();
        self.conclude(result);
        self.pump();
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn resume(&mut self) -> Result<Outcome, ActorError> {
        for child in self.children.values_mut() {
            if let Err(err) = child.start() {
                debug!(actor = %child.address, error = %err, "child not resumed");
            }
        }
        self.step(|behavior, state, scope| behavior.resume(state, scope))
    }

    /// Send an event to this actor.
    ///
    /// Before start the event is queued. Once the actor has stopped or
    /// errored the event is dropped. The stop event stops the actor.
    ///
    /// Work that settled before this call is processed first, so events are
    /// handled in the order they arrived.
    pub fn send(&mut self, event: impl Into<Event>) {
        if self.status == ActorStatus::Running {
            self.pump();
        }
        self.enqueue(event.into());
        if self.status == ActorStatus::Running {
            self.pump();
        }
    }

    /// Process external work that has settled since the last call.
    pub fn flush(&mut self) {
        self.pump();
    }

    /// Process external work as it arrives until `predicate` holds.
    ///
    /// Fails with [`ActorError::Terminated`] if the actor stops or errors
    /// before the predicate holds. A running actor with nothing in flight
    /// never terminates on its own, so a predicate that cannot hold waits
    /// forever; bound the wait with [`tokio::time::timeout`] when that can
    /// happen.
    pub async fn wait_for<P>(&mut self, predicate: P) -> Result<Snapshot, ActorError>
    where
        P: Fn(&Snapshot) -> bool,
    {
        loop {
            self.pump();
            let snapshot = self.get_snapshot();
            if predicate(&snapshot) {
                return Ok(snapshot);
            }
            if self.status.is_terminal() {
                return Err(ActorError::Terminated {
                    actor: self.address.to_string(),
                });
            }
            let Some(inbox) = self.inbox.as_mut() else {
                return Err(ActorError::Terminated {
                    actor: self.address.to_string(),
                });
            };
            // the root holds a postbox too, so its inbox never closes
            if let Some(envelope) = inbox.recv().await {
                self.deliver(envelope);
            }
        }
    }

    /// Stop the actor and all of its children. Idempotent.
    ///
    /// Exit actions do not run; timers, tasks and subscriptions are torn
    /// down and subscribers are completed.
    pub fn stop(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        info!(actor = %self.address, "stopping actor");
        self.teardown();
        self.status = ActorStatus::Stopped;
        self.mailbox.clear();
        self.publish();
        self.observers.complete();
    }

    pub fn subscribe(&self, observer: impl Observer + 'static) -> Subscription {
        self.observers.subscribe(observer)
    }

    /// Last published snapshot.
    pub fn get_snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn actor_ref(&self) -> ActorRef {
        ActorRef::new(
            self.address.clone(),
            self.postbox.clone(),
            self.snapshots.subscribe(),
            self.observers.clone(),
        )
    }

    /// Handle to a running child.
    pub fn child(&self, id: &str) -> Option<ActorRef> {
        self.children.get(id).map(Actor::actor_ref)
    }

    pub fn metadata(&self) -> &ActorMetadata {
        &self.metadata
    }

    /// Persisted form of this actor and its children.
    pub fn get_persisted_state(&self) -> PersistedState {
        PersistedState {
            version: CHECKPOINT_VERSION,
            id: self.id.clone(),
            src: self.src.clone(),
            input: self.input.clone(),
            status: self.status,
            behavior: self.behavior.persist(&self.state),
            children: self
                .children
                .values()
                .map(Actor::get_persisted_state)
                .collect(),
            output: self.output.clone(),
            error: self.error.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Rebuild an actor tree from its persisted form.
    ///
    /// Entry actions do not run. Children are recreated from the behaviors
    /// registered on their parent machine. Live resources come back when
    /// the restored actor is started.
    pub fn restore(
        behavior: impl Into<Behavior>,
        persisted: &PersistedState,
    ) -> Result<Self, CheckpointError> {
        persisted.validate_version()?;
        let (postbox, inbox) = Postbox::channel();
        Self::rebuild(
            behavior.into(),
            Address::root(persisted.id.clone()),
            None,
            persisted,
            postbox,
            Some(inbox),
        )
    }

    fn rebuild(
        behavior: Behavior,
        address: Address,
        parent: Option<Address>,
        persisted: &PersistedState,
        postbox: Postbox,
        inbox: Option<mpsc::UnboundedReceiver<Envelope>>,
    ) -> Result<Self, CheckpointError> {
        let state = behavior.restore(&persisted.behavior)?;
        let mut actor = Self::build(
            behavior,
            address,
            parent,
            persisted.src.clone(),
            persisted.input.clone(),
            postbox,
            inbox,
        );
        actor.state = state;
        actor.status = persisted.status;
        actor.output = persisted.output.clone();
        actor.error = persisted.error.clone();
        actor.metadata = persisted.metadata.clone();

        for child in &persisted.children {
            let src = child.src.clone().unwrap_or_default();
            let behavior =
                actor
                    .behavior
                    .source(&src)
                    .ok_or_else(|| CheckpointError::UnknownSource {
                        id: child.id.clone(),
                        src: src.clone(),
                    })?;
            let restored = Self::rebuild(
                behavior,
                actor.address.child(child.id.clone()),
                Some(actor.address.clone()),
                child,
                actor.postbox.clone(),
                None,
            )?;
            actor.children.insert(child.id.clone(), restored);
        }

        actor.snapshots.send_replace(actor.current());
        debug!(actor = %actor.address, status = ?actor.status, "restored actor");
        Ok(actor)
    }

    fn enqueue(&mut self, event: Event) {
        if self.status.is_terminal() {
            debug!(actor = %self.address, event = %event.kind, "actor is terminated, dropping event");
            return;
        }
        if event.is_stop() {
            self.stop();
            return;
        }
        self.mailbox.push_back(event);
    }

    /// Run to idle, then deliver posted envelopes one at a time, running to
    /// idle after each so an envelope is checked against the tree as the
    /// earlier ones left it.
    fn pump(&mut self) {
        self.run_until_idle();
        while let Some(envelope) = self.next_envelope() {
            self.deliver(envelope);
            self.run_until_idle();
        }
    }

    fn next_envelope(&mut self) -> Option<Envelope> {
        self.inbox.as_mut()?.try_recv().ok()
    }

    fn deliver(&mut self, envelope: Envelope) {
        if envelope.is_stale() {
            debug!(to = %envelope.to, event = %envelope.event.kind, "sender was cancelled, dropping event");
            return;
        }
        let Envelope { to, event, .. } = envelope;
        let target = match to.segments().split_first() {
            Some((root, path)) if *root == self.id => self.locate(path),
            _ => None,
        };
        match target {
            Some(actor) => actor.enqueue(event),
            None => debug!(to = %to, event = %event.kind, "no such actor, dropping event"),
        }
    }

    fn locate(&mut self, path: &[String]) -> Option<&mut Actor> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self.children.get_mut(head)?.locate(rest),
        }
    }

    /// Drain this actor's mailbox, then its children's, then collect what
    /// the children sent upward, until nothing moves.
    fn run_until_idle(&mut self) -> bool {
        let mut worked = false;
        loop {
            let mut progressed = false;

            while self.status == ActorStatus::Running {
                let Some(event) = self.mailbox.pop_front() else {
                    break;
                };
                progressed = true;
                self.process(event);
            }

            let mut upward = Vec::new();
            for child in self.children.values_mut() {
                progressed |= child.run_until_idle();
                upward.append(&mut child.outbox);
            }

            let finished: Vec<String> = self
                .children
                .iter()
                .filter(|(_, child)| child.status.is_terminal())
                .map(|(id, _)| id.clone())
                .collect();
            for id in finished {
                self.children.shift_remove(&id);
                debug!(actor = %self.address, child = %id, "removed finished child");
            }

            if !upward.is_empty() && self.status == ActorStatus::Running {
                progressed = true;
                self.mailbox.extend(upward);
            }

            if !progressed {
                return worked;
            }
            worked = true;
        }
    }

    fn process(&mut self, event: Event) {
        debug!(actor = %self.address, event = %event.kind, "processing event");
        let result = self.step(|behavior, state, scope| behavior.transition(state, &event, scope));
        if result.is_ok() {
            self.metadata.touch();
        }
        self.conclude(result);
    }

    /// Run one behavior hook, apply its effects, and commit the new state
    /// only if every effect applied.
    fn step<F>(&mut self, hook: F) -> Result<Outcome, ActorError>
    where
        F: FnOnce(&Behavior, &BehaviorState, &mut ActorScope<'_>) -> Result<BehaviorState, ActorError>,
    {
        let mut scope = ActorScope {
            id: &self.id,
            address: &self.address,
            parent: self.parent.as_ref(),
            postbox: &self.postbox,
            token: &self.token,
            effects: Vec::new(),
        };
        let next = hook(&self.behavior, &self.state, &mut scope)?;
        let effects = scope.into_effects();
        let outcome = self.apply(effects)?;
        self.state = next;
        Ok(outcome)
    }

    fn conclude(&mut self, result: Result<Outcome, ActorError>) {
        match result {
            Ok(Outcome::Continue) => self.publish(),
            Ok(Outcome::Done(output)) => self.complete(output),
            Ok(Outcome::Failed(error)) => self.fault(ActorError::Failed(error)),
            Err(err) => self.fault(err),
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Result<Outcome, ActorError> {
        let mut outcome = Outcome::Continue;
        for effect in effects {
            match effect {
                Effect::Execute {
                    name,
                    action,
                    context,
                    event,
                } => {
                    let args = ActionArgs {
                        actor_id: &self.id,
                        context: &context,
                        event: &event,
                    };
                    action
                        .execute(&args)
                        .map_err(|message| ActorError::Action { name, message })?;
                }
                Effect::Log { message, context } => {
                    info!(actor = %self.address, context = %context, "{message}");
                }
                Effect::SendParent(event) => {
                    if self.parent.is_some() {
                        self.outbox.push(event);
                    } else {
                        debug!(actor = %self.address, event = %event.kind, "root actor has no parent, dropping event");
                    }
                }
                Effect::SendTo { to, event } => self.send_to(&to, event),
                Effect::Spawn { id, src, input } => self.spawn(id, &src, input)?,
                Effect::Stop { id } => {
                    if let Some(mut child) = self.children.shift_remove(&id) {
                        child.stop();
                    }
                }
                Effect::Schedule { id, delay, event } => {
                    let runtime = Handle::try_current().map_err(|_| ActorError::NoRuntime {
                        actor: self.address.to_string(),
                    })?;
                    let token = CancelToken::new();
                    let sender = EventSender::new(
                        Some(self.address.clone()),
                        self.postbox.clone(),
                        token.clone(),
                    );
                    token.attach(runtime.spawn(async move {
                        tokio::time::sleep(delay).await;
                        sender.send(event);
                    }));
                    if let Some(previous) = self.timers.insert(id, token) {
                        previous.cancel();
                    }
                }
                Effect::Cancel { id } => {
                    if let Some(timer) = self.timers.remove(&id) {
                        timer.cancel();
                    }
                }
                Effect::Done { output } => outcome = Outcome::Done(output),
                Effect::Failed { error } => outcome = Outcome::Failed(error),
            }
        }
        Ok(outcome)
    }

    fn send_to(&mut self, to: &str, event: Event) {
        if to == self.id {
            self.mailbox.push_back(event);
            return;
        }
        match self.children.get_mut(to) {
            Some(child) => child.enqueue(event),
            None => warn!(actor = %self.address, to, event = %event.kind, "no such child, dropping event"),
        }
    }

    fn spawn(&mut self, id: String, src: &str, input: Value) -> Result<(), ActorError> {
        if self.children.contains_key(&id) {
            warn!(actor = %self.address, child = %id, "child already exists, skipping spawn");
            return Ok(());
        }
        let behavior = self
            .behavior
            .source(src)
            .ok_or_else(|| ActorError::UnknownSource {
                src: src.to_string(),
            })?;
        let mut child = Self::build(
            behavior,
            self.address.child(id.clone()),
            Some(self.address.clone()),
            Some(src.to_string()),
            input,
            self.postbox.clone(),
            None,
        );
        if let Err(err) = child.start() {
            debug!(actor = %child.address, error = %err, "child failed to start");
        }
        self.children.insert(id, child);
        Ok(())
    }

    fn complete(&mut self, output: Value) {
        info!(actor = %self.address, "actor finished");
        self.teardown();
        self.status = ActorStatus::Stopped;
        // null and absent output persist the same way
        self.output = (!output.is_null()).then(|| output.clone());
        self.mailbox.clear();
        if self.parent.is_some() {
            self.outbox.push(Event::done_actor(&self.id, output));
        }
        self.publish();
        self.observers.complete();
    }

    fn fault(&mut self, err: ActorError) {
        error!(actor = %self.address, error = %err, "actor failed");
        let message = err.to_string();
        self.teardown();
        self.status = ActorStatus::Errored;
        self.error = Some(message.clone());
        self.mailbox.clear();
        if self.parent.is_some() {
            self.outbox.push(Event::error_actor(&self.id, &message));
        }
        self.publish();
        self.observers.error(&message);
    }

    fn teardown(&mut self) {
        for (_, mut child) in self.children.drain(..) {
            child.stop();
        }
        self.behavior.stop(&mut self.state);
        self.token.cancel();
        for (_, timer) in self.timers.drain() {
            timer.cancel();
        }
    }

    fn current(&self) -> Snapshot {
        let view = self.behavior.snapshot(&self.state);
        Snapshot {
            status: self.status,
            value: view.value,
            context: view.context,
            children: self.children.keys().cloned().collect(),
            output: self.output.clone(),
            error: self.error.clone(),
        }
    }

    fn publish(&mut self) {
        let snapshot = self.current();
        self.snapshots.send_replace(snapshot.clone());
        self.observers.next(&snapshot);
    }
}

impl Drop for Actor {
    fn drop(&mut self) {
        self.token.cancel();
        for (_, timer) in self.timers.drain() {
            timer.cancel();
        }
    }
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("address", &self.address)
            .field("status", &self.status)
            .field("children", &self.children.len())
            .field("mailbox", &self.mailbox.len())
            .finish()
    }
}
