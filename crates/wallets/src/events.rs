//! Observer registration without an ambient global object.
//!
//! Every registration returns a [`ListenerId`] and callers remove exactly the listener they
//! added. [`Subscription`] packages that removal as a disposer.

use parking_lot::Mutex;
use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

/// Identifies one registered listener.
pub type ListenerId = u64;

/// A shared event handler.
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Invoked when a wallet asks the application to reconnect.
pub type ReconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// A keyed multi-listener event emitter.
pub struct EventEmitter<K, E> {
    inner: Mutex<Listeners<K, E>>,
}

struct Listeners<K, E> {
    next_id: ListenerId,
    by_event: HashMap<K, Vec<(ListenerId, Handler<E>)>>,
}

impl<K, E> Default for EventEmitter<K, E> {
    fn default() -> Self {
        Self { inner: Mutex::new(Listeners { next_id: 0, by_event: HashMap::new() }) }
    }
}

impl<K, E> fmt::Debug for EventEmitter<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventEmitter")
            .field("listeners", &inner.by_event.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl<K: Eq + Hash, E> EventEmitter<K, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`.
    pub fn on(&self, event: K, handler: Handler<E>) -> ListenerId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_event.entry(event).or_default().push((id, handler));
        id
    }

    /// Removes the listener `id` registered for `event`. Returns whether it was present.
    pub fn off(&self, event: &K, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let Some(listeners) = inner.by_event.get_mut(event) else { return false };
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            inner.by_event.remove(event);
        }
        removed
    }

    /// Calls every listener registered for `event` and returns how many ran.
    ///
    /// Handlers run outside the lock and may register or remove listeners.
    pub fn emit(&self, event: &K, payload: &E) -> usize {
        let handlers: Vec<_> = self
            .inner
            .lock()
            .by_event
            .get(event)
            .map(|listeners| listeners.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn listener_count(&self, event: &K) -> usize {
        self.inner.lock().by_event.get(event).map_or(0, Vec::len)
    }
}

/// A DOM-style target dispatching payload-less named events.
pub trait EventTarget: Send + Sync {
    fn add_event_listener(&self, event: &str, listener: Handler<()>) -> ListenerId;

    fn remove_event_listener(&self, event: &str, id: ListenerId) -> bool;
}

impl EventTarget for EventEmitter<String, ()> {
    fn add_event_listener(&self, event: &str, listener: Handler<()>) -> ListenerId {
        self.on(event.to_string(), listener)
    }

    fn remove_event_listener(&self, event: &str, id: ListenerId) -> bool {
        self.off(&event.to_string(), id)
    }
}

/// Disposer for a set of registered listeners.
///
/// Dropping a subscription without calling [`unsubscribe`](Self::unsubscribe) leaves its
/// listeners registered.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self { dispose: Some(Box::new(dispose)) }
    }

    /// A subscription that registered nothing.
    pub fn noop() -> Self {
        Self { dispose: None }
    }

    /// Removes the listeners this subscription registered.
    pub fn unsubscribe(mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.dispose.is_some()).finish()
    }
}
