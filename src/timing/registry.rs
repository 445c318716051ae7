use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::timer::TimeSample;
use crate::la_error::LinalgError;

/// Accumulated timings of one task.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TimingEntry {
    /// Number of recorded intervals.
    pub count: u64,
    /// Total wall time in seconds.
    pub wall: f64,
    pub user: f64,
    pub system: f64,
}

/// Whether reading an entry also removes it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimingClear {
    Keep,
    Clear,
}

static REGISTRY: Lazy<DashMap<String, TimingEntry>> = Lazy::new(DashMap::new);

pub(crate) fn record(task: &str, sample: TimeSample) {
    let mut entry = REGISTRY.entry(task.to_string()).or_default();
    entry.count += 1;
    entry.wall += sample.wall;
    entry.user += sample.user;
    entry.system += sample.system;
    log::trace!(
        "timing `{task}`: +{:.6}s wall (count {})",
        sample.wall,
        entry.count
    );
}

/// Accumulated timing for `task`.
pub fn timing(task: &str, clear: TimingClear) -> Result<TimingEntry, LinalgError> {
    let found = match clear {
        TimingClear::Keep => REGISTRY.get(task).map(|e| *e),
        TimingClear::Clear => REGISTRY.remove(task).map(|(_, e)| e),
    };
    found.ok_or_else(|| LinalgError::UnknownTask(task.to_string()))
}

/// Snapshot of every entry, sorted by task name.
pub fn list_timings(clear: TimingClear) -> Vec<(String, TimingEntry)> {
    let mut all: Vec<(String, TimingEntry)> = REGISTRY
        .iter()
        .map(|e| (e.key().clone(), *e.value()))
        .collect();
    if clear == TimingClear::Clear {
        for (task, _) in &all {
            REGISTRY.remove(task);
        }
    }
    all.sort_by(|a, b| a.0.cmp(&b.0));
    all
}

pub fn clear_timings() {
    REGISTRY.clear();
}
