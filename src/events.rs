//! Listener registry for event fan-out.
//!
//! Each receiver event (connection state, audio chunk, emotion update) is
//! backed by a [`Listeners`] collection. Registration hands back a stable
//! [`ListenerId`] token; removal accepts it. Dispatch order is the order of
//! registration.
//!
//! # Deadlock Prevention
//!
//! Callbacks are collected under the registry lock, then the lock is
//! released before any callback is invoked. This allows a listener to add
//! or remove registrations (including its own) from inside its callback
//! without deadlocking and without affecting delivery to the other
//! listeners of the same dispatch.

use std::sync::{Arc, Mutex};

/// Stable token identifying one registered listener.
///
/// Returned by [`Listeners::add`]; pass it to [`Listeners::remove`] to
/// unregister. Tokens are never reused within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Shared callback type stored per listener.
type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Inner state: registration-ordered listeners plus a monotonic ID counter.
struct ListenersInner<T> {
    entries: Vec<(ListenerId, Callback<T>)>,
    next_id: u64,
}

/// An ordered collection of listeners for one event.
pub struct Listeners<T> {
    inner: Mutex<ListenersInner<T>>,
}

impl<T> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Listeners<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ListenersInner {
                entries: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Register a listener and return its token.
    pub fn add(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let mut inner = self.inner.lock().expect("listener registry poisoned");
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, Arc::new(callback)));
        id
    }

    /// Unregister a listener.
    ///
    /// Returns `true` if the token was registered. Removing an unknown or
    /// already-removed token is a no-op.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock().expect("listener registry poisoned");
        let before = inner.entries.len();
        inner.entries.retain(|(entry_id, _)| *entry_id != id);
        inner.entries.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("listener registry poisoned")
            .entries
            .len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify all currently registered listeners.
    ///
    /// Iterates a snapshot taken under the lock, so listeners registered or
    /// removed during dispatch do not disturb this dispatch: a listener
    /// removed mid-dispatch may still see the in-flight event, and a
    /// listener added mid-dispatch first sees the next one.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = {
            let inner = self.inner.lock().expect("listener registry poisoned");
            inner
                .entries
                .iter()
                .map(|(_, cb)| Arc::clone(cb))
                .collect()
        };

        for callback in snapshot {
            callback(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_add_and_emit() {
        let listeners: Listeners<u32> = Listeners::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        listeners.add(move |v| {
            assert_eq!(*v, 7);
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(&7);
        listeners.emit(&7);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_stops_delivery() {
        let listeners: Listeners<()> = Listeners::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        let id = listeners.add(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(&());
        assert!(listeners.remove(id));
        listeners.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        // Second removal of the same token is a no-op
        assert!(!listeners.remove(id));
    }

    #[test]
    fn test_tokens_are_not_reused() {
        let listeners: Listeners<()> = Listeners::new();
        let a = listeners.add(|_| {});
        listeners.remove(a);
        let b = listeners.add(|_| {});
        assert_ne!(a, b);
    }

    #[test]
    fn test_dispatch_order_is_registration_order() {
        let listeners: Listeners<()> = Listeners::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order_clone = Arc::clone(&order);
            listeners.add(move |_| {
                order_clone.lock().unwrap().push(label);
            });
        }

        listeners.emit(&());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_remove_self_during_dispatch() {
        let listeners: Arc<Listeners<()>> = Arc::new(Listeners::new());
        let count = Arc::new(AtomicUsize::new(0));

        // First listener removes itself when fired.
        let self_id = Arc::new(Mutex::new(None));
        let self_id_clone = Arc::clone(&self_id);
        let listeners_clone = Arc::clone(&listeners);
        let id = listeners.add(move |_| {
            if let Some(id) = *self_id_clone.lock().unwrap() {
                listeners_clone.remove(id);
            }
        });
        *self_id.lock().unwrap() = Some(id);

        // Second listener must still be notified on the same dispatch.
        let count_clone = Arc::clone(&count);
        listeners.add(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 1);

        // Next dispatch no longer reaches the removed listener.
        listeners.emit(&());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_add_during_dispatch_sees_next_event() {
        let listeners: Arc<Listeners<u32>> = Arc::new(Listeners::new());
        let late_hits = Arc::new(AtomicUsize::new(0));

        let listeners_clone = Arc::clone(&listeners);
        let late_hits_clone = Arc::clone(&late_hits);
        let armed = Arc::new(AtomicUsize::new(0));
        let armed_clone = Arc::clone(&armed);
        listeners.add(move |_| {
            // Register a new listener the first time we fire.
            if armed_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                let hits = Arc::clone(&late_hits_clone);
                listeners_clone.add(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        listeners.emit(&1);
        // The listener added mid-dispatch did not see the in-flight event.
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);

        listeners.emit(&2);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }
}
