// Observer registry with RAII unregistration.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::error;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Slots<E> {
    next_id: u64,
    entries: Vec<(u64, Listener<E>)>,
}

/// A set of callbacks for one event type.
///
/// `emit` snapshots the current listeners and calls them with the lock
/// released, so a listener may register or drop handles re-entrantly. A
/// panicking listener is logged and does not affect the others.
pub(crate) struct ListenerRegistry<E> {
    slots: Arc<Mutex<Slots<E>>>,
}

impl<E: 'static> ListenerRegistry<E> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub(crate) fn register(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ListenerHandle {
        let id = {
            let mut slots = lock(&self.slots);
            let id = slots.next_id;
            slots.next_id += 1;
            slots.entries.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<Slots<E>>> = Arc::downgrade(&self.slots);
        ListenerHandle::new(move || {
            if let Some(slots) = weak.upgrade() {
                lock(&slots).entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    pub(crate) fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = lock(&self.slots)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!("listener panicked; continuing with remaining listeners");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.slots).entries.len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registration token returned by `on_message` / `on_connection_event`.
///
/// Dropping the handle unregisters the listener. Call [`detach`](Self::detach)
/// to keep it registered for the life of the connection.
#[must_use = "dropping a ListenerHandle unregisters the listener"]
pub struct ListenerHandle {
    unregister: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerHandle {
    fn new(unregister: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// Unregister now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the listener registered after this handle is dropped.
    pub fn detach(mut self) {
        self.unregister = None;
    }

    fn release(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("active", &self.unregister.is_some())
            .finish()
    }
}
