//! Supervisor Metrics

use core::fmt;
use metrics::Counter;

/// Supervisor Metrics
#[derive(Clone, Debug)]
pub struct SupervisorMetrics {
    /// Number of started runs
    pub(crate) runs_total: Counter,
    /// Number of finished runs, whatever their outcome
    pub(crate) finished_runs_total: Counter,
    /// Number of runs that returned an error
    pub(crate) failed_runs_total: Counter,
    /// Number of runs that panicked
    pub(crate) panicked_runs_total: Counter,
}

impl SupervisorMetrics {
    pub(crate) fn new(task: &'static str) -> Self {
        Self {
            runs_total: metrics::counter!("supervisor.runs_total", "task" => task),
            finished_runs_total: metrics::counter!(
                "supervisor.finished_runs_total",
                "task" => task
            ),
            failed_runs_total: metrics::counter!("supervisor.failed_runs_total", "task" => task),
            panicked_runs_total: metrics::counter!(
                "supervisor.panicked_runs_total",
                "task" => task
            ),
        }
    }

    /// Increments the counter for started runs.
    pub(crate) fn inc_runs(&self) {
        self.runs_total.increment(1);
    }
}

/// Helper type for increasing counters even if a task fails
pub struct IncCounterOnDrop(Counter);

impl fmt::Debug for IncCounterOnDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IncCounterOnDrop").finish()
    }
}

impl IncCounterOnDrop {
    /// Creates a new instance of `IncCounterOnDrop` with the given counter.
    pub const fn new(counter: Counter) -> Self {
        Self(counter)
    }
}

impl Drop for IncCounterOnDrop {
    /// Increment the counter when the instance is dropped.
    fn drop(&mut self) {
        self.0.increment(1);
    }
}
