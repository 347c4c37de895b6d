use crate::registry::EventTypeId;

/// Claimed origin of a [`schedule_event`](crate::CoreTiming::schedule_event)
/// call.
///
/// Scheduling from the wrong thread would silently break determinism, so the
/// claim is checked against the CPU collaborator's thread-identity query and
/// a mismatch is a programmer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FromThread {
    Cpu,
    NonCpu,
    /// Resolve the origin from the current thread's identity.
    Any,
}

/// A single scheduled occurrence of a registered event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Virtual-cycle count at which the callback becomes eligible to fire.
    pub deadline: i64,
    /// Monotonic insertion tag, assigned at the moment the event enters the
    /// heap (for cross-thread submissions: at drain time, not submit time).
    /// Breaks ties between events sharing a deadline.
    pub sequence: u64,
    /// Opaque payload handed back to the callback. It is serialized into
    /// save states, so it must never encode a pointer.
    pub userdata: u64,
    pub ty: EventTypeId,
}

impl Event {
    /// Dispatch order: earlier deadline first, then earlier insertion.
    /// Same-deadline events fire in submission order; this tie-break is the
    /// only thing save states and replays rely on for ordering.
    pub(crate) fn sort_key(&self) -> (i64, u64) {
        (self.deadline, self.sequence)
    }
}
