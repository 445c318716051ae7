use std::ops::{Add, Sub};
use std::time::Instant;

use super::registry;

/// Elapsed wall, user and system time in seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TimeSample {
    pub wall: f64,
    pub user: f64,
    pub system: f64,
}

impl Add for TimeSample {
    type Output = TimeSample;

    fn add(self, rhs: TimeSample) -> TimeSample {
        TimeSample {
            wall: self.wall + rhs.wall,
            user: self.user + rhs.user,
            system: self.system + rhs.system,
        }
    }
}

impl Sub for TimeSample {
    type Output = TimeSample;

    fn sub(self, rhs: TimeSample) -> TimeSample {
        TimeSample {
            wall: self.wall - rhs.wall,
            user: self.user - rhs.user,
            system: self.system - rhs.system,
        }
    }
}

#[cfg(unix)]
fn cpu_times() -> (f64, f64) {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: getrusage fills the struct it is handed and reports failure
    // through its return code.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return (0.0, 0.0);
    }
    // SAFETY: zero-initialised and written by a successful getrusage.
    let usage = unsafe { usage.assume_init() };
    let secs = |tv: libc::timeval| tv.tv_sec as f64 + tv.tv_usec as f64 * 1e-6;
    (secs(usage.ru_utime), secs(usage.ru_stime))
}

#[cfg(not(unix))]
fn cpu_times() -> (f64, f64) {
    (0.0, 0.0)
}

#[derive(Copy, Clone, Debug)]
struct Stamp {
    wall: Instant,
    user: f64,
    system: f64,
}

impl Stamp {
    fn now() -> Self {
        let (user, system) = cpu_times();
        Self {
            wall: Instant::now(),
            user,
            system,
        }
    }

    fn since(&self) -> TimeSample {
        let (user, system) = cpu_times();
        TimeSample {
            wall: self.wall.elapsed().as_secs_f64(),
            user: user - self.user,
            system: system - self.system,
        }
    }
}

/// Scoped stopwatch. Starts on construction; a named timer records into the
/// registry once, on `stop` or when dropped while running.
#[derive(Debug)]
pub struct Timer {
    task: Option<String>,
    started: Option<Stamp>,
    last: TimeSample,
}

impl Timer {
    /// Running timer recorded under `task`.
    pub fn new(task: impl Into<String>) -> Self {
        let mut t = Self::unstarted(task);
        t.start();
        t
    }

    /// Running timer that is never recorded.
    pub fn anonymous() -> Self {
        Self {
            task: None,
            started: Some(Stamp::now()),
            last: TimeSample::default(),
        }
    }

    pub(crate) fn unstarted(task: impl Into<String>) -> Self {
        Self {
            task: Some(task.into()),
            started: None,
            last: TimeSample::default(),
        }
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// (Re)start; a running timer is restarted without recording.
    pub fn start(&mut self) {
        self.started = Some(Stamp::now());
    }

    /// Time since start while running, otherwise the last stopped interval.
    pub fn elapsed(&self) -> TimeSample {
        self.started.map_or(self.last, |s| s.since())
    }

    /// Stop and record (if named). Stopping a stopped timer returns the last
    /// interval and records nothing.
    pub fn stop(&mut self) -> TimeSample {
        if let Some(start) = self.started.take() {
            self.last = start.since();
            if let Some(task) = &self.task {
                registry::record(task, self.last);
            }
        }
        self.last
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}
