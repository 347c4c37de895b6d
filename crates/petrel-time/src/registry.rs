use std::collections::HashMap;

use crate::scheduler::CoreTiming;

/// Callback invoked when a scheduled event comes due.
///
/// Receives the owning system, the scheduler itself (callbacks may
/// reentrantly schedule follow-up events), the event's userdata, and how
/// many cycles past its deadline the dispatch happened.
pub type TimedCallback<S> = fn(&mut S, &mut CoreTiming<S>, u64, i64);

/// Name of the sentinel type that absorbs events whose registered type is
/// unknown after loading a save state.
pub const LOST_EVENT_NAME: &str = "_lost_event";

/// Stable handle to a registered event type.
///
/// Identity-based: two handles refer to the same event type iff they compare
/// equal. A handle stays valid until the registry is cleared; names may be
/// reused across full shutdown cycles without the old handles aliasing the
/// new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventTypeId(pub(crate) u32);

struct EventType<S> {
    name: String,
    callback: TimedCallback<S>,
}

/// Interned event types: display name plus callback, addressed by stable
/// index handles.
pub(crate) struct EventTypeRegistry<S> {
    types: Vec<EventType<S>>,
    by_name: HashMap<String, EventTypeId>,
}

impl<S> EventTypeRegistry<S> {
    pub(crate) fn new() -> Self {
        Self {
            types: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Intern a fresh event type. Names must stay unique: they are the
    /// identity events are serialized under.
    pub(crate) fn register(&mut self, name: &str, callback: TimedCallback<S>) -> EventTypeId {
        if let Some(&existing) = self.by_name.get(name) {
            debug_assert!(
                false,
                "event type {name:?} is already registered; types may only be \
                 registered once, during startup, or save states break"
            );
            return existing;
        }
        let id = EventTypeId(self.types.len() as u32);
        self.types.push(EventType {
            name: name.to_owned(),
            callback,
        });
        self.by_name.insert(name.to_owned(), id);
        id
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<EventTypeId> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn name(&self, id: EventTypeId) -> &str {
        &self.types[id.0 as usize].name
    }

    pub(crate) fn callback(&self, id: EventTypeId) -> TimedCallback<S> {
        self.types[id.0 as usize].callback
    }

    pub(crate) fn contains(&self, id: EventTypeId) -> bool {
        (id.0 as usize) < self.types.len()
    }

    pub(crate) fn clear(&mut self) {
        self.types.clear();
        self.by_name.clear();
    }
}
