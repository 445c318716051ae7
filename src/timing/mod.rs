//! Wall-clock and CPU timing of named tasks.
//!
//! A [`Timer`] is a scoped stopwatch; named timers add their elapsed time to
//! a process-wide registry when stopped or dropped. [`Timed`] wraps a
//! callable and times each invocation under one task name.

mod registry;
mod timed;
mod timer;

pub use registry::{TimingClear, TimingEntry, clear_timings, list_timings, timing};
pub use timed::{Timed, TimedPhase, timed};
pub use timer::{TimeSample, Timer};
