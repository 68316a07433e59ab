//! What a behavior may touch while it runs.

use super::error::ActorError;
use super::reference::{Address, EventSender, Postbox};
use crate::core::Effect;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Monotonic cancellation flag shared by an actor and its async work.
///
/// Cancelling aborts every attached task; tasks attached afterwards are
/// aborted immediately. Senders built on the token go inert.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        let tasks = std::mem::take(
            &mut *self
                .state
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            task.abort();
        }
    }

    pub(crate) fn attach(&self, task: JoinHandle<()>) {
        if self.is_cancelled() {
            task.abort();
            return;
        }
        let mut tasks = self
            .state
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

/// Handed to a behavior during `start`, `transition` and `resume`.
///
/// Behaviors report what should happen as [`Effect`]s; the actor applies
/// them once the behavior returns.
pub struct ActorScope<'a> {
    pub(crate) id: &'a str,
    pub(crate) address: &'a Address,
    pub(crate) parent: Option<&'a Address>,
    pub(crate) postbox: &'a Postbox,
    pub(crate) token: &'a CancelToken,
    pub(crate) effects: Vec<Effect>,
}

impl<'a> ActorScope<'a> {
    pub fn id(&self) -> &str {
        self.id
    }

    pub fn address(&self) -> &Address {
        self.address
    }

    pub fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn extend(&mut self, effects: impl IntoIterator<Item = Effect>) {
        self.effects.extend(effects);
    }

    /// Sender delivering to this actor.
    pub fn sender(&self) -> EventSender {
        EventSender::new(
            Some(self.address.clone()),
            self.postbox.clone(),
            self.token.clone(),
        )
    }

    /// Sender delivering to the parent; inert for a root actor.
    pub fn parent_sender(&self) -> EventSender {
        EventSender::new(
            self.parent.cloned(),
            self.postbox.clone(),
            self.token.clone(),
        )
    }

    /// Run `task` on the current tokio runtime, tied to this actor's
    /// lifetime.
    pub fn spawn<F>(&self, task: F) -> Result<(), ActorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| ActorError::NoRuntime {
            actor: self.address.to_string(),
        })?;
        self.token.attach(handle.spawn(task));
        Ok(())
    }

    pub(crate) fn into_effects(self) -> Vec<Effect> {
        self.effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_aborts_attached_tasks() {
        let token = CancelToken::new();
        let task = tokio::spawn(std::future::pending::<()>());
        let probe = task.abort_handle();
        token.attach(task);

        token.cancel();
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(token.is_cancelled());
        assert!(probe.is_finished());
    }

    #[tokio::test]
    async fn tasks_attached_after_cancel_are_aborted() {
        let token = CancelToken::new();
        token.cancel();

        let task = tokio::spawn(std::future::pending::<()>());
        let probe = task.abort_handle();
        token.attach(task);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(probe.is_finished());
    }

    #[test]
    fn spawn_without_runtime_fails() {
        let (postbox, _inbox) = Postbox::channel();
        let address = Address::root("app");
        let token = CancelToken::new();
        let scope = ActorScope {
            id: "app",
            address: &address,
            parent: None,
            postbox: &postbox,
            token: &token,
            effects: Vec::new(),
        };

        let result = scope.spawn(async {});

        assert!(matches!(result, Err(ActorError::NoRuntime { .. })));
    }
}
