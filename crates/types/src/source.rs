//! Event lookup.

use crate::{Event, EventId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Pull-based lookup of already-known events.
///
/// The consensus core reads self-parent frames and walks ancestors through
/// this trait; it never writes to it.
pub trait EventSource: Send + Sync {
    fn has_event(&self, id: &EventId) -> bool;

    fn get_event(&self, id: &EventId) -> Option<Arc<Event>>;
}

/// In-memory event source.
///
/// Cloning shares the underlying map; use [`EventStore::snapshot`] for an
/// independent copy.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Arc<RwLock<HashMap<EventId, Arc<Event>>>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: Event) -> Arc<Event> {
        let event = Arc::new(event);
        self.events.write().insert(event.id(), event.clone());
        event
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Deep copy that shares nothing with `self`.
    pub fn snapshot(&self) -> Self {
        Self {
            events: Arc::new(RwLock::new(self.events.read().clone())),
        }
    }
}

impl EventSource for EventStore {
    fn has_event(&self, id: &EventId) -> bool {
        self.events.read().contains_key(id)
    }

    fn get_event(&self, id: &EventId) -> Option<Arc<Event>> {
        self.events.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Epoch, MutableEvent, ValidatorId};

    #[test]
    fn test_snapshot_is_independent() {
        let store = EventStore::new();
        let a = MutableEvent {
            epoch: Epoch(1),
            seq: 1,
            creator: ValidatorId(1),
            lamport: 1,
            ..Default::default()
        }
        .build();
        let snapshot = store.snapshot();
        store.insert(a.clone());

        assert!(store.has_event(&a.id()));
        assert!(!snapshot.has_event(&a.id()));
        assert_eq!(store.get_event(&a.id()).as_deref(), Some(&a));
    }
}
