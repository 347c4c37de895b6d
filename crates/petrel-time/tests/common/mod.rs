// Each integration-test binary uses a different subset of these helpers.
#![allow(dead_code)]

use petrel_time::{CoreTiming, EventTypeId, GpuFifo, GuestCpu, TimingConfig};

/// Recording host: implements the collaborator traits and keeps a trace of
/// every observable side effect.
pub struct TestSystem {
    pub downcount: i32,
    /// `(userdata, cycles_late)` for every dispatched recording callback.
    pub trace: Vec<(u64, i64)>,
    pub exceptions_checked: u32,
    pub perf_updates: Vec<u32>,
    pub flushes: u32,
    pub determinism: bool,
    /// Event type the chaining callbacks schedule at dispatch time.
    pub chain_type: Option<EventTypeId>,
    /// Delta the chaining callbacks schedule with.
    pub chain_delta: i64,
}

impl TestSystem {
    pub fn new() -> Self {
        Self {
            downcount: 0,
            trace: Vec::new(),
            exceptions_checked: 0,
            perf_updates: Vec::new(),
            flushes: 0,
            determinism: false,
            chain_type: None,
            chain_delta: 0,
        }
    }
}

impl GuestCpu for TestSystem {
    fn downcount(&self) -> i32 {
        self.downcount
    }

    fn set_downcount(&mut self, downcount: i32) {
        self.downcount = downcount;
    }

    fn check_external_exceptions(&mut self) {
        self.exceptions_checked += 1;
    }

    fn update_performance_monitor(&mut self, cycles: u32, _num_load_stores: u32, _num_fp_inst: u32) {
        self.perf_updates.push(cycles);
    }

    fn is_cpu_thread(&self) -> bool {
        true
    }

    fn wants_determinism(&self) -> bool {
        self.determinism
    }
}

impl GpuFifo for TestSystem {
    fn flush_gpu(&mut self) {
        self.flushes += 1;
    }
}

pub struct TestConfig {
    pub overclock_enable: bool,
    pub overclock: f32,
    pub sync_on_skip_idle: bool,
}

impl TestConfig {
    pub fn default_speed() -> Self {
        Self {
            overclock_enable: false,
            overclock: 1.0,
            sync_on_skip_idle: false,
        }
    }

    pub fn overclocked(factor: f32) -> Self {
        Self {
            overclock_enable: true,
            overclock: factor,
            sync_on_skip_idle: false,
        }
    }
}

impl TimingConfig for TestConfig {
    fn overclock_enable(&self) -> bool {
        self.overclock_enable
    }

    fn overclock(&self) -> f32 {
        self.overclock
    }

    fn sync_on_skip_idle(&self) -> bool {
        self.sync_on_skip_idle
    }
}

/// Record `(userdata, cycles_late)` into the system trace.
pub fn record(system: &mut TestSystem, _timing: &mut CoreTiming<TestSystem>, userdata: u64, cycles_late: i64) {
    system.trace.push((userdata, cycles_late));
}

/// Record, then reentrantly schedule `chain_type` another `chain_delta`
/// cycles out with the same userdata.
pub fn record_then_chain(
    system: &mut TestSystem,
    timing: &mut CoreTiming<TestSystem>,
    userdata: u64,
    cycles_late: i64,
) {
    system.trace.push((userdata, cycles_late));
    let ty = system.chain_type.expect("chain_type not set up by the test");
    let delta = system.chain_delta;
    timing.schedule_event(system, delta, ty, userdata, petrel_time::FromThread::Cpu);
}
