use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::metrics::{IncCounterOnDrop, SupervisorMetrics};

/// Delays between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Wait after a successful run.
    pub interval: Duration,
    /// Wait after a failed or panicked run.
    pub cooldown: Duration,
}

impl SupervisorConfig {
    pub const fn new(interval: Duration, cooldown: Duration) -> Self {
        Self { interval, cooldown }
    }
}

/// How a single run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
    Panicked,
}

/// Totals of a supervised loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub runs: usize,
    pub failures: usize,
    pub panics: usize,
}

/// Resolves on ctrl-c. If the signal handler cannot be installed the future
/// never resolves.
pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("received ctrl-c, shutting down");
}

/// Runs a job periodically and never lets it take the process down.
#[derive(Debug, Clone)]
pub struct Supervisor {
    name: &'static str,
    config: SupervisorConfig,
    metrics: SupervisorMetrics,
}

impl Supervisor {
    pub fn new(name: &'static str, config: SupervisorConfig) -> Self {
        Self {
            name,
            config,
            metrics: SupervisorMetrics::new(name),
        }
    }

    pub fn config(&self) -> SupervisorConfig {
        self.config
    }

    fn delay_after(&self, outcome: RunOutcome) -> Duration {
        match outcome {
            RunOutcome::Succeeded => self.config.interval,
            RunOutcome::Failed | RunOutcome::Panicked => self.config.cooldown,
        }
    }

    fn spawn<Fut, E>(&self, run: Fut) -> tokio::task::JoinHandle<Result<(), E>>
    where
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        self.metrics.inc_runs();
        let finished = IncCounterOnDrop::new(self.metrics.finished_runs_total.clone());
        tokio::spawn(async move {
            let _finished = finished;
            run.await
        })
    }

    fn settle<E: fmt::Display>(
        &self,
        result: Result<Result<(), E>, tokio::task::JoinError>,
    ) -> RunOutcome {
        match result {
            Ok(Ok(())) => {
                debug!(task = self.name, "run succeeded");
                RunOutcome::Succeeded
            }
            Ok(Err(error)) => {
                self.metrics.failed_runs_total.increment(1);
                warn!(
                    task = self.name,
                    %error,
                    cooldown = %humantime::format_duration(self.config.cooldown),
                    "run failed"
                );
                RunOutcome::Failed
            }
            Err(join_error) => {
                self.metrics.panicked_runs_total.increment(1);
                error!(
                    task = self.name,
                    error = %join_error,
                    cooldown = %humantime::format_duration(self.config.cooldown),
                    "run panicked"
                );
                RunOutcome::Panicked
            }
        }
    }

    /// Run the job once on its own task.
    pub async fn run_once<F, Fut, E>(&self, job: &mut F) -> RunOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let result = self.spawn(job()).await;
        self.settle(result)
    }

    /// Run the job until `shutdown` resolves. A run in progress when the
    /// signal arrives is allowed to finish.
    pub async fn run_until<F, Fut, E, S>(&self, mut job: F, shutdown: S) -> SupervisorReport
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
        S: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);
        let mut report = SupervisorReport::default();
        info!(
            task = self.name,
            interval = %humantime::format_duration(self.config.interval),
            cooldown = %humantime::format_duration(self.config.cooldown),
            "supervisor started"
        );

        loop {
            let mut handle = self.spawn(job());
            let mut stopping = false;
            let result = tokio::select! {
                result = &mut handle => result,
                () = &mut shutdown => {
                    info!(task = self.name, "shutdown requested, waiting for the current run");
                    stopping = true;
                    handle.await
                }
            };

            let outcome = self.settle(result);
            report.runs += 1;
            match outcome {
                RunOutcome::Succeeded => {}
                RunOutcome::Failed => report.failures += 1,
                RunOutcome::Panicked => report.panics += 1,
            }
            if stopping {
                break;
            }

            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(self.delay_after(outcome)) => {}
            }
        }

        info!(
            task = self.name,
            runs = report.runs,
            failures = report.failures,
            panics = report.panics,
            "supervisor stopped"
        );
        report
    }
}
