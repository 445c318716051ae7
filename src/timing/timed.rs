use parking_lot::Mutex;

use super::timer::Timer;

/// Lifecycle of a [`Timed`] wrapper.
///
/// `Unarmed` until the first call; `Armed` once a call has arrived and its
/// timer exists; `Recording` while the callable runs; `Idle` after the
/// interval has been committed to the registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimedPhase {
    Unarmed,
    Armed,
    Recording,
    Idle,
}

/// A callable timed under `task` on every invocation.
///
/// No timer is created and nothing is recorded until the first call, so a
/// wrapper that is dropped unused leaves no registry entry.
pub struct Timed<F> {
    task: String,
    f: F,
    phase: Mutex<TimedPhase>,
}

pub fn timed<F>(task: impl Into<String>, f: F) -> Timed<F> {
    Timed {
        task: task.into(),
        f,
        phase: Mutex::new(TimedPhase::Unarmed),
    }
}

impl<F> Timed<F> {
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn phase(&self) -> TimedPhase {
        *self.phase.lock()
    }

    pub fn inner(&self) -> &F {
        &self.f
    }

    /// Invoke the wrapped callable, timing only the call itself.
    pub fn call<A, R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
    {
        let mut timer = {
            let mut phase = self.phase.lock();
            if *phase == TimedPhase::Unarmed {
                log::trace!("arming timer for `{}`", self.task);
                *phase = TimedPhase::Armed;
            }
            let mut timer = Timer::unstarted(self.task.clone());
            *phase = TimedPhase::Recording;
            timer.start();
            timer
        };
        let out = (self.f)(args);
        timer.stop();
        *self.phase.lock() = TimedPhase::Idle;
        out
    }
}
