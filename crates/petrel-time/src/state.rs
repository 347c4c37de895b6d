//! Save-state serialization of the scheduler.
//!
//! Event types cannot be persisted as handles: nothing guarantees they are
//! registered in the same order (or at all) on the loading side. Each
//! pending event therefore travels with its type's registered name, and the
//! name is resolved back to a handle on load. An unknown name is remapped to
//! the lost-event sentinel rather than rejected; a save state that fires a
//! no-op is recoverable, a save state that refuses to load is not.

use petrel_snapshot::{Decoder, Encoder, Result};
use tracing::warn;

use crate::event::Event;
use crate::scaling::CycleScaling;
use crate::scheduler::CoreTiming;

const DATA_MARKER: &str = "CoreTimingData";
const EVENTS_MARKER: &str = "CoreTimingEvents";

impl<S> CoreTiming<S> {
    /// Serialize the scheduler.
    ///
    /// Producers are fenced out for the duration and the cross-thread inbox
    /// is drained into the heap first, so in-flight events are captured and
    /// the inbox itself is never part of a save state.
    pub fn save_state(&mut self) -> Vec<u8> {
        let _producers = self.inbox.lock_producers();
        for mut event in self.inbox.drain() {
            event.sequence = self.next_sequence;
            self.next_sequence += 1;
            self.heap.push(event);
        }

        let mut enc = Encoder::new()
            .i32(self.slice_length)
            .i64(self.global_timer)
            .i64(self.idled_cycles)
            .u32(self.fake_dec_start_value)
            .u64(self.fake_dec_start_ticks)
            .u64(self.fake_tb_start_value)
            .u64(self.fake_tb_start_ticks)
            .f32(self.scaling.factor())
            .u64(self.next_sequence)
            .marker(DATA_MARKER)
            .u32(self.heap.len() as u32);
        for event in self.heap.iter() {
            enc = enc
                .i64(event.deadline)
                .u64(event.sequence)
                .u64(event.userdata)
                .string(self.registry.name(event.ty));
        }
        enc.marker(EVENTS_MARKER).finish()
    }

    /// Restore the scheduler from a stream produced by
    /// [`save_state`](Self::save_state).
    ///
    /// The registry is left untouched; the loading side is expected to have
    /// registered its event types already. The heap is rebuilt from scratch:
    /// the serialized order is whatever layout the saving side's heap
    /// happened to have, which is implementation-defined.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<()> {
        let _producers = self.inbox.lock_producers();
        // Anything still in flight from before the load belongs to the old
        // timeline.
        for _ in self.inbox.drain() {}

        let mut dec = Decoder::new(bytes);
        self.slice_length = dec.i32()?;
        self.global_timer = dec.i64()?;
        self.idled_cycles = dec.i64()?;
        self.fake_dec_start_value = dec.u32()?;
        self.fake_dec_start_ticks = dec.u64()?;
        self.fake_tb_start_value = dec.u64()?;
        self.fake_tb_start_ticks = dec.u64()?;
        let factor = dec.f32()?;
        self.scaling = CycleScaling::new(factor, 1.0 / factor);
        self.next_sequence = dec.u64()?;
        dec.marker(DATA_MARKER)?;

        let count = dec.u32()?;
        let mut events = Vec::new();
        for _ in 0..count {
            let deadline = dec.i64()?;
            let sequence = dec.u64()?;
            let userdata = dec.u64()?;
            let name = dec.string()?;
            let ty = match self.registry.lookup(&name) {
                Some(ty) => ty,
                None => {
                    warn!("lost event from save state: type {name:?} is not registered");
                    self.lost_event_type
                }
            };
            events.push(Event {
                deadline,
                sequence,
                userdata,
                ty,
            });
        }
        dec.marker(EVENTS_MARKER)?;

        self.heap.replace(events);
        self.inbox.publish_timer(self.global_timer);
        Ok(())
    }
}
