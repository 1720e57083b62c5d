//! Event system for the Bayeux client lifecycle.
//!
//! Provides a typed observer interface: each event family is an enum
//! implementing [`BusEvent`], and listeners subscribe to that enum rather than
//! to loosely-typed channel names.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by a Bayeux client component.
pub trait BusEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g., "HandshakeAttempted", "Unsuccessful").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the client instance that emitted this event.
    fn client_name(&self) -> &str;
}

/// Trait for listening to client events.
pub trait EventListener<E: BusEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for boxed event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// Handle returned when a listener is registered, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw numeric value of this id.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// An ordered collection of event listeners.
///
/// Listeners are called in registration order. Removing a listener keeps the
/// relative order of the remaining ones.
#[derive(Clone)]
pub struct EventListeners<E: BusEvent> {
    listeners: Vec<(ListenerId, BoxedEventListener<E>)>,
    next_id: u64,
}

impl<E: BusEvent> EventListeners<E> {
    /// Creates a new empty event listener collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Adds a listener to the collection and returns its id.
    pub fn add<L>(&mut self, listener: L) -> ListenerId
    where
        L: EventListener<E> + 'static,
    {
        self.add_boxed(Arc::new(listener))
    }

    /// Adds an already shared listener to the collection.
    pub fn add_boxed(&mut self, listener: BoxedEventListener<E>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Removes the listener registered under `id`.
    ///
    /// Returns `false` if no such listener was registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(candidate, _)| *candidate != id);
        self.listeners.len() != before
    }

    /// Emits an event to all registered listeners.
    ///
    /// If a listener panics, the panic is caught and the remaining listeners
    /// will still be called.
    pub fn emit(&self, event: &E) {
        for (_, listener) in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: BusEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A simple function-based event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: BusEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
