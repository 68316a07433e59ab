//! Snapshot observers and subscriptions.

use super::snapshot::Snapshot;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Receives snapshots from an actor.
///
/// `complete` is called once when the actor stops or finishes, `error` once
/// when it faults. No calls follow either of them. Closures taking a
/// `&Snapshot` are observers too.
///
/// Observers run synchronously inside the actor's processing loop and must
/// not subscribe or unsubscribe on the same actor from within a callback.
pub trait Observer: Send {
    fn next(&mut self, snapshot: &Snapshot);

    fn error(&mut self, _error: &str) {}

    fn complete(&mut self) {}
}

impl<F> Observer for F
where
    F: FnMut(&Snapshot) + Send,
{
    fn next(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(u64, Box<dyn Observer>)>,
}

/// Observer list shared between an actor and its references.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    inner: Arc<Mutex<Registry>>,
}

impl Observers {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn subscribe(&self, observer: impl Observer + 'static) -> Subscription {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Box::new(observer)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn next(&self, snapshot: &Snapshot) {
        for (_, observer) in self.lock().entries.iter_mut() {
            observer.next(snapshot);
        }
    }

    /// Notify `error` and drop every observer.
    pub(crate) fn error(&self, error: &str) {
        let entries = std::mem::take(&mut self.lock().entries);
        for (_, mut observer) in entries {
            observer.error(error);
        }
    }

    /// Notify `complete` and drop every observer.
    pub(crate) fn complete(&self) {
        let entries = std::mem::take(&mut self.lock().entries);
        for (_, mut observer) in entries {
            observer.complete();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping it keeps the observer registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove the observer. Calling this more than once, or after the actor
    /// is gone, does nothing.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn closures_receive_snapshots() {
        let observers = Observers::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let _subscription = observers.subscribe(move |_: &Snapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        observers.next(&Snapshot::not_started());
        observers.next(&Snapshot::not_started());

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let observers = Observers::default();
        let subscription = observers.subscribe(|_: &Snapshot| {});
        assert_eq!(observers.len(), 1);

        subscription.unsubscribe();
        subscription.unsubscribe();

        assert_eq!(observers.len(), 0);
    }

    #[test]
    fn complete_is_delivered_once() {
        struct Recorder(Arc<AtomicUsize>);
        impl Observer for Recorder {
            fn next(&mut self, _: &Snapshot) {}
            fn complete(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let observers = Observers::default();
        let completed = Arc::new(AtomicUsize::new(0));
        observers.subscribe(Recorder(Arc::clone(&completed)));

        observers.complete();
        observers.complete();

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(observers.len(), 0);
    }
}
