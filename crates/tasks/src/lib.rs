//! Supervised periodic tasks.
//!
//! A [`Supervisor`] runs one job at a time, forever: every run is spawned on
//! its own tokio task so that a panic is contained, errors and panics are
//! logged and followed by a cooldown, and a shutdown signal stops the loop
//! once the in-flight run has finished.

mod metrics;
mod supervisor;

pub use metrics::{IncCounterOnDrop, SupervisorMetrics};
pub use supervisor::{RunOutcome, Supervisor, SupervisorConfig, SupervisorReport, shutdown_signal};
