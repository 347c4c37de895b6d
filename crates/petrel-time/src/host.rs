//! Collaborator seams the scheduler drives.
//!
//! The scheduler owns no CPU, GPU, or configuration of its own; a host
//! system implements these traits and is threaded through the CPU loop as
//! an explicit value.

/// The guest CPU as the scheduler sees it: a downcount register plus a few
/// entry points.
pub trait GuestCpu {
    /// Remaining budget for the current slice, in scaled cycles. Negative
    /// once the CPU has retired past the slice boundary.
    fn downcount(&self) -> i32;

    fn set_downcount(&mut self, downcount: i32);

    /// Invoked at the end of every `advance`, after event dispatch, so a
    /// callback that raises an interrupt gets it serviced in the same slice
    /// instead of a full slice later.
    fn check_external_exceptions(&mut self);

    /// Statistics hook fired when idle-skipping banks the rest of a slice.
    fn update_performance_monitor(&mut self, cycles: u32, num_load_stores: u32, num_fp_inst: u32);

    /// Whether the calling thread is the CPU thread.
    fn is_cpu_thread(&self) -> bool;

    /// True while a replay or netplay session demands a deterministic
    /// schedule.
    fn wants_determinism(&self) -> bool;
}

/// The GPU command FIFO. Flushed before idle-skipping under strict sync so
/// skipped cycles cannot desynchronize video.
pub trait GpuFifo {
    fn flush_gpu(&mut self);
}

/// Configuration scalars the scheduler snapshots between slices.
pub trait TimingConfig {
    fn overclock_enable(&self) -> bool;
    fn overclock(&self) -> f32;
    fn sync_on_skip_idle(&self) -> bool;
}
