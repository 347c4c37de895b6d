use std::fmt::Write as _;

use tracing::{error, info};

use crate::event::{Event, FromThread};
use crate::heap::EventHeap;
use crate::host::{GpuFifo, GuestCpu, TimingConfig};
use crate::inbox::{CrossThreadScheduler, Inbox};
use crate::registry::{EventTypeId, EventTypeRegistry, TimedCallback, LOST_EVENT_NAME};
use crate::scaling::CycleScaling;

/// Upper bound on the cycle budget handed to the CPU between two
/// [`CoreTiming::advance`] calls.
pub const MAX_SLICE_LENGTH: i32 = 20_000;

fn lost_event_callback<S>(_system: &mut S, _timing: &mut CoreTiming<S>, _userdata: u64, _cycles_late: i64) {
}

/// The core event scheduler: a deterministic priority queue of named, timed
/// callbacks interleaved with guest CPU execution in bounded slices.
///
/// One privileged CPU thread owns this value and drives
/// [`advance`](Self::advance) at every slice boundary. Other threads may
/// only submit events through the handle returned by
/// [`cross_thread_scheduler`](Self::cross_thread_scheduler); their events
/// sit in an inbox until the CPU thread drains them at the next safe point.
///
/// Event callbacks run synchronously on the CPU thread and may reentrantly
/// schedule further events; a callback scheduled with a delta of zero from
/// inside another callback fires in the same dispatch pass.
pub struct CoreTiming<S> {
    pub(crate) registry: EventTypeRegistry<S>,
    pub(crate) heap: EventHeap,
    pub(crate) inbox: Inbox,

    pub(crate) global_timer: i64,
    pub(crate) slice_length: i32,
    pub(crate) scaling: CycleScaling,
    pub(crate) idled_cycles: i64,
    pub(crate) next_sequence: u64,
    /// True only while `advance` is dispatching callbacks. Outside that
    /// window `global_timer` lags by however much of the slice has already
    /// executed.
    pub(crate) is_global_timer_sane: bool,
    pub(crate) lost_event_type: EventTypeId,

    pub(crate) fake_dec_start_value: u32,
    pub(crate) fake_dec_start_ticks: u64,
    pub(crate) fake_tb_start_value: u64,
    pub(crate) fake_tb_start_ticks: u64,

    pub(crate) config_oc_factor: f32,
    pub(crate) config_oc_inv_factor: f32,
    pub(crate) config_sync_on_skip_idle: bool,
}

impl<S: GuestCpu> CoreTiming<S> {
    /// Build a scheduler at cycle zero and program the CPU for its first
    /// slice.
    ///
    /// The span between construction and the first `advance` is the boundary
    /// between slice -1 and slice 0: the dispatcher loop must call `advance`
    /// before executing the first guest instruction of each slice.
    pub fn new(cpu: &mut S, config: &impl TimingConfig) -> Self {
        let mut registry = EventTypeRegistry::new();
        let lost_event_type = registry.register(LOST_EVENT_NAME, lost_event_callback::<S>);

        let mut timing = Self {
            registry,
            heap: EventHeap::new(),
            inbox: Inbox::new(),
            global_timer: 0,
            slice_length: MAX_SLICE_LENGTH,
            scaling: CycleScaling::identity(),
            idled_cycles: 0,
            next_sequence: 0,
            is_global_timer_sane: true,
            lost_event_type,
            fake_dec_start_value: 0,
            fake_dec_start_ticks: 0,
            fake_tb_start_value: 0,
            fake_tb_start_ticks: 0,
            config_oc_factor: 1.0,
            config_oc_inv_factor: 1.0,
            config_sync_on_skip_idle: false,
        };
        timing.refresh_config(config);
        timing.scaling = CycleScaling::new(timing.config_oc_factor, timing.config_oc_inv_factor);
        timing.inbox.publish_determinism(cpu.wants_determinism());
        cpu.set_downcount(timing.scaling.cycles_to_downcount(MAX_SLICE_LENGTH));
        timing
    }

    /// Current virtual-cycle count as observed by the guest. CPU thread
    /// only.
    ///
    /// Inside a callback dispatched from `advance` this is exact; mid-slice
    /// it adds the portion of the slice the CPU has already consumed.
    pub fn get_ticks(&self, cpu: &S) -> u64 {
        let mut ticks = self.global_timer;
        if !self.is_global_timer_sane {
            let downcount = self.scaling.downcount_to_cycles(cpu.downcount());
            ticks += i64::from(self.slice_length - downcount);
        }
        ticks as u64
    }

    /// Queue `event_type` to fire `cycles_into_future` cycles from now.
    ///
    /// A negative delta is permitted and fires immediately. `from` is the
    /// caller's claimed origin; a claim that disagrees with the actual
    /// thread is a programmer error that would break determinism.
    ///
    /// On the CPU thread the event goes straight into the heap, and if its
    /// deadline lands inside the current slice the slice is shortened so
    /// control returns in time. Off the CPU thread the event goes into the
    /// inbox with a deadline computed from the (possibly stale) published
    /// timer.
    pub fn schedule_event(
        &mut self,
        cpu: &mut S,
        cycles_into_future: i64,
        event_type: EventTypeId,
        userdata: u64,
        from: FromThread,
    ) {
        debug_assert!(
            self.registry.contains(event_type),
            "schedule_event called with an unregistered event type"
        );

        let from_cpu_thread = match from {
            FromThread::Any => cpu.is_cpu_thread(),
            FromThread::Cpu | FromThread::NonCpu => {
                let claimed_cpu = from == FromThread::Cpu;
                debug_assert!(
                    claimed_cpu == cpu.is_cpu_thread(),
                    "a {:?} event was scheduled from the wrong thread ({})",
                    self.registry.name(event_type),
                    if claimed_cpu { "CPU" } else { "non-CPU" },
                );
                claimed_cpu
            }
        };

        if from_cpu_thread {
            let deadline = self.get_ticks(cpu) as i64 + cycles_into_future;

            // If this event needs to fire before the next slice boundary,
            // pull the boundary in.
            if !self.is_global_timer_sane {
                self.force_exception_check(cpu, cycles_into_future);
            }

            let sequence = self.next_sequence;
            self.next_sequence += 1;
            self.heap.push(Event {
                deadline,
                sequence,
                userdata,
                ty: event_type,
            });
        } else {
            if cpu.wants_determinism() {
                error!(
                    "off-thread {:?} event scheduled while netplay or replay is active; \
                     this is likely to cause a desync",
                    self.registry.name(event_type),
                );
            }
            self.inbox.push(Event {
                deadline: self.global_timer + cycles_into_future,
                sequence: 0,
                userdata,
                ty: event_type,
            });
        }
    }

    /// Shorten the current slice so control returns to `advance` within
    /// `cycles` cycles. Negative values clamp to zero; a value at or beyond
    /// the current remaining budget is a no-op.
    pub fn force_exception_check(&mut self, cpu: &mut S, cycles: i64) {
        let cycles = cycles.max(0);
        let remaining = self.scaling.downcount_to_cycles(cpu.downcount());
        if i64::from(remaining) > cycles {
            // The downcount is always far below i32::MAX, so the cast is
            // safe. Cycles already executed stay accounted by shrinking the
            // slice in step with the downcount.
            self.slice_length -= remaining - cycles as i32;
            cpu.set_downcount(self.scaling.cycles_to_downcount(cycles as i32));
        }
    }

    /// Slice boundary: account the cycles the CPU consumed, fire everything
    /// that came due, and size the next slice.
    pub fn advance(&mut self, system: &mut S) {
        self.inbox.publish_determinism(system.wants_determinism());
        self.move_events();

        let executed = self.slice_length - self.scaling.downcount_to_cycles(system.downcount());
        self.global_timer += i64::from(executed);
        self.inbox.publish_timer(self.global_timer);
        self.scaling = CycleScaling::new(self.config_oc_factor, self.config_oc_inv_factor);
        self.slice_length = MAX_SLICE_LENGTH;

        self.is_global_timer_sane = true;
        while let Some(event) = self.heap.pop_due(self.global_timer) {
            let callback = self.registry.callback(event.ty);
            let cycles_late = self.global_timer - event.deadline;
            callback(system, self, event.userdata, cycles_late);
        }
        self.is_global_timer_sane = false;

        if let Some(next) = self.heap.peek() {
            self.slice_length =
                (next.deadline - self.global_timer).min(i64::from(MAX_SLICE_LENGTH)) as i32;
        }
        system.set_downcount(self.scaling.cycles_to_downcount(self.slice_length));

        // Service exceptions only after event dispatch; a callback that
        // raises an interrupt must not wait a full slice for it to be seen.
        system.check_external_exceptions();
    }
}

impl<S: GuestCpu + GpuFifo> CoreTiming<S> {
    /// Skip the rest of the slice when the CPU would otherwise busy-wait.
    ///
    /// The remaining budget is banked as idled cycles and the downcount is
    /// zeroed, so the next instruction boundary re-enters `advance`. The
    /// guest perceives the skipped span as having executed instantly.
    pub fn idle(&mut self, system: &mut S) {
        if self.config_sync_on_skip_idle {
            // Skipping ahead while the FIFO is mid-frame would desynchronize
            // video; wait for the GPU to drain first.
            system.flush_gpu();
        }

        let downcount = system.downcount();
        system.update_performance_monitor(downcount as u32, 0, 0);
        self.idled_cycles += i64::from(self.scaling.downcount_to_cycles(downcount));
        system.set_downcount(0);
    }
}

impl<S> CoreTiming<S> {
    /// Intern a named callback and get the handle events are scheduled
    /// under.
    ///
    /// Event types may only be registered during startup: a type registered
    /// mid-session changes what save states resolve names against.
    pub fn register_event(&mut self, name: &str, callback: TimedCallback<S>) -> EventTypeId {
        self.registry.register(name, callback)
    }

    /// Clear the registry. Requires an empty heap; pending events would be
    /// left holding dangling handles. The lost-event sentinel is immediately
    /// re-registered so it is always present.
    pub fn unregister_all_events(&mut self) {
        debug_assert!(
            self.heap.is_empty(),
            "cannot unregister event types with events pending"
        );
        self.registry.clear();
        self.lost_event_type = self.registry.register(LOST_EVENT_NAME, lost_event_callback::<S>);
    }

    /// Handle for threads other than the CPU thread to submit events with.
    pub fn cross_thread_scheduler(&self) -> CrossThreadScheduler {
        self.inbox.handle()
    }

    /// Drain the cross-thread inbox into the heap, assigning each drained
    /// event its insertion sequence.
    pub fn move_events(&mut self) {
        for mut event in self.inbox.drain() {
            event.sequence = self.next_sequence;
            self.next_sequence += 1;
            self.heap.push(event);
        }
    }

    /// Erase every pending heap event of the given type.
    pub fn remove_event(&mut self, event_type: EventTypeId) {
        self.heap.erase_if(|event| event.ty == event_type);
    }

    /// Erase every pending event of the given type, including ones still in
    /// the cross-thread inbox.
    pub fn remove_all_events(&mut self, event_type: EventTypeId) {
        // Inbox residents only become erasable once drained.
        self.move_events();
        self.remove_event(event_type);
    }

    /// Rescale every pending deadline after the emulated core clock changed
    /// from `old_clock` to `new_clock` Hz.
    ///
    /// The transform is uniform and monotone about the current timer, so
    /// relative order (and with it the heap property) is preserved. Only the
    /// heap is touched: events still in the cross-thread inbox keep their
    /// old-clock deadlines, so call this while the inbox is quiescent or
    /// accept the brief inconsistency.
    pub fn adjust_event_queue_times(&mut self, new_clock: u32, old_clock: u32) {
        let global_timer = self.global_timer;
        self.heap.retime(|deadline| {
            let ticks = (deadline - global_timer) * i64::from(new_clock) / i64::from(old_clock);
            global_timer + ticks
        });
    }

    /// Drop every pending heap event.
    pub fn clear_pending_events(&mut self) {
        self.heap.clear();
    }

    /// Tear down at emulator shutdown: discard anything still queued and
    /// clear the registry. Producers are fenced out for the duration.
    pub fn shutdown(&mut self) {
        let _producers = self.inbox.lock_producers();
        for _ in self.inbox.drain() {}
        self.heap.clear();
        self.registry.clear();
        self.lost_event_type = self.registry.register(LOST_EVENT_NAME, lost_event_callback::<S>);
    }

    /// Re-snapshot the configuration scalars. Takes effect at the next
    /// `advance`; the scaling frozen for the current slice is not touched.
    pub fn refresh_config(&mut self, config: &impl TimingConfig) {
        self.config_oc_factor = if config.overclock_enable() {
            config.overclock()
        } else {
            1.0
        };
        self.config_oc_inv_factor = 1.0 / self.config_oc_factor;
        self.config_sync_on_skip_idle = config.sync_on_skip_idle();
    }

    /// Total cycles skipped by [`idle`](Self::idle) so far.
    pub fn get_idle_ticks(&self) -> u64 {
        self.idled_cycles as u64
    }

    /// Sentinel type unknown save-state names are remapped to.
    pub fn lost_event_type(&self) -> EventTypeId {
        self.lost_event_type
    }

    /// Sorted copy of the pending queue, for diagnostics.
    pub fn pending_events(&self) -> Vec<Event> {
        self.heap.sorted_snapshot()
    }

    /// Log every pending event, in dispatch order.
    pub fn log_pending_events(&self) {
        for event in self.heap.sorted_snapshot() {
            info!(
                "PENDING: now: {} deadline: {} type: {}",
                self.global_timer,
                event.deadline,
                self.registry.name(event.ty),
            );
        }
    }

    /// Human-readable dump of the pending queue, in dispatch order.
    pub fn scheduled_events_summary(&self) -> String {
        let mut text = String::from("Scheduled events\n");
        text.reserve(1000);
        for event in self.heap.sorted_snapshot() {
            let _ = writeln!(
                text,
                "{} : {} {:016x}",
                self.registry.name(event.ty),
                event.deadline,
                event.userdata,
            );
        }
        text
    }

    pub fn fake_dec_start_value(&self) -> u32 {
        self.fake_dec_start_value
    }

    pub fn set_fake_dec_start_value(&mut self, value: u32) {
        self.fake_dec_start_value = value;
    }

    pub fn fake_dec_start_ticks(&self) -> u64 {
        self.fake_dec_start_ticks
    }

    pub fn set_fake_dec_start_ticks(&mut self, ticks: u64) {
        self.fake_dec_start_ticks = ticks;
    }

    pub fn fake_tb_start_value(&self) -> u64 {
        self.fake_tb_start_value
    }

    pub fn set_fake_tb_start_value(&mut self, value: u64) {
        self.fake_tb_start_value = value;
    }

    pub fn fake_tb_start_ticks(&self) -> u64 {
        self.fake_tb_start_ticks
    }

    pub fn set_fake_tb_start_ticks(&mut self, ticks: u64) {
        self.fake_tb_start_ticks = ticks;
    }
}
