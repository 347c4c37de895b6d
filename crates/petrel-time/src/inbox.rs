use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::error;

use crate::event::Event;
use crate::registry::EventTypeId;

/// State shared between the scheduler and off-thread producers.
///
/// The mutex around the sender is not protecting the channel (the channel is
/// already thread-safe); it serializes producers so the queue stays
/// effectively single-producer, and it lets the serializer fence every
/// producer out while a save state is taken.
struct InboxShared {
    producer: Mutex<Sender<Event>>,
    /// Timer value published at the last slice boundary. Off-thread deadline
    /// arithmetic reads this, accepting staleness of up to one slice.
    global_timer: AtomicI64,
    wants_determinism: AtomicBool,
}

/// Cross-thread inbox: events submitted off the CPU thread wait here until
/// the CPU thread drains them into the heap at the next safe point.
pub(crate) struct Inbox {
    shared: Arc<InboxShared>,
    consumer: Receiver<Event>,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            shared: Arc::new(InboxShared {
                producer: Mutex::new(tx),
                global_timer: AtomicI64::new(0),
                wants_determinism: AtomicBool::new(false),
            }),
            consumer: rx,
        }
    }

    /// Drain everything currently visible to the consumer. Never blocks and
    /// never touches the producer lock.
    pub(crate) fn drain(&self) -> impl Iterator<Item = Event> + '_ {
        self.consumer.try_iter()
    }

    /// Owner-side submission; takes the producer lock like any other
    /// producer would.
    pub(crate) fn push(&self, event: Event) {
        let producer = self.lock_producers();
        let _ = producer.send(event);
    }

    /// Hold the guard to keep every producer out, e.g. for the duration of
    /// serialization.
    pub(crate) fn lock_producers(&self) -> MutexGuard<'_, Sender<Event>> {
        self.shared.producer.lock().unwrap()
    }

    pub(crate) fn publish_timer(&self, global_timer: i64) {
        self.shared.global_timer.store(global_timer, Ordering::Relaxed);
    }

    pub(crate) fn publish_determinism(&self, wanted: bool) {
        self.shared.wants_determinism.store(wanted, Ordering::Relaxed);
    }

    pub(crate) fn handle(&self) -> CrossThreadScheduler {
        CrossThreadScheduler {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Clone-able producer handle for threads other than the CPU thread.
///
/// Deadlines computed here use the timer published at the last slice
/// boundary, which may be stale by up to one slice; that is the documented
/// price of keeping the CPU-side scheduling path lock-free. The insertion
/// sequence is assigned when the CPU thread drains the inbox, so off-thread
/// submissions interleaved with CPU-thread submissions at the same deadline
/// do not keep their relative submission order.
#[derive(Clone)]
pub struct CrossThreadScheduler {
    shared: Arc<InboxShared>,
}

impl CrossThreadScheduler {
    /// Queue `event_type` to fire `cycles_into_future` cycles after the last
    /// published timer value.
    pub fn schedule_event(&self, cycles_into_future: i64, event_type: EventTypeId, userdata: u64) {
        if self.shared.wants_determinism.load(Ordering::Relaxed) {
            error!(
                ?event_type,
                "off-thread event scheduled while netplay or replay is active; \
                 this is likely to cause a desync"
            );
        }
        let deadline = self.shared.global_timer.load(Ordering::Relaxed) + cycles_into_future;
        let producer = self.shared.producer.lock().unwrap();
        // Sequence 0 is a placeholder; the consumer assigns the real tag at
        // drain time.
        let _ = producer.send(Event {
            deadline,
            sequence: 0,
            userdata,
            ty: event_type,
        });
    }
}
