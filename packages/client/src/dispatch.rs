//! Typed dispatch table for inbound events.
//!
//! Handlers are keyed by [`EventKind`] and invoked in registration order.
//! Registration hands back a [`HandlerId`] so the owner can deregister
//! explicitly; the connection manager clears the whole table on close.

use std::collections::HashMap;

use crate::dto::websocket::{EventKind, InboundEvent};

/// Handler invoked for every delivered event of the registered kind
pub type EventHandler = Box<dyn FnMut(&InboundEvent) + Send>;

/// Token returned by [`EventDispatcher::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Vec<(HandlerId, EventHandler)>>,
    next_id: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EventKind, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Remove a handler. Returns `false` if the id is unknown (already removed or cleared).
    pub fn deregister(&mut self, id: HandlerId) -> bool {
        for handlers in self.handlers.values_mut() {
            if let Some(index) = handlers.iter().position(|(handler_id, _)| *handler_id == id) {
                handlers.remove(index);
                return true;
            }
        }
        false
    }

    /// Invoke every handler registered for the event's kind.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&mut self, event: &InboundEvent) -> usize {
        let Some(handlers) = self.handlers.get_mut(&event.kind()) else {
            tracing::trace!("No handler registered for '{}'", event.kind());
            return 0;
        };

        for (_, handler) in handlers.iter_mut() {
            handler(event);
        }
        handlers.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .handlers
            .iter()
            .map(|(kind, handlers)| (*kind, handlers.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .finish()
    }
}
