//! The sampling loop.
//!
//! One collection-and-export cycle runs immediately. With a non-zero
//! interval the loop then waits on the first of {interrupt, tick, duration
//! expiry}. The output is closed exactly once, whichever way the loop ends.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::collector::{MetricsProvider, Target};
use crate::error::{CollectError, Error};
use crate::export::SinkWriter;
use crate::snapshot::ProcessMetrics;

/// Lifecycle of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Sampling,
    /// One-shot run finished or the duration elapsed.
    Completed,
    Interrupted,
    Failed,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Sampling => "sampling",
            SchedulerState::Completed => "completed",
            SchedulerState::Interrupted => "interrupted",
            SchedulerState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// `Completed` or `Interrupted`.
    pub state: SchedulerState,
    /// Collection-and-export cycles performed.
    pub cycles: u64,
    /// Snapshots written across all cycles.
    pub snapshots: u64,
    pub elapsed: Duration,
}

/// Drives periodic sampling of one target into one sink.
pub struct Scheduler<P> {
    provider: P,
    target: Target,
    interval: Duration,
    duration: Duration,
    sink: SinkWriter,
    state: SchedulerState,
    cycles: u64,
    snapshots: u64,
}

impl<P: MetricsProvider> Scheduler<P> {
    /// One-shot scheduler; see [`with_interval`](Self::with_interval).
    pub fn new(provider: P, target: Target, sink: SinkWriter) -> Self {
        Self {
            provider,
            target,
            interval: Duration::ZERO,
            duration: Duration::ZERO,
            sink,
            state: SchedulerState::Idle,
            cycles: 0,
            snapshots: 0,
        }
    }

    /// Zero means a single cycle.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Zero means unbounded. Ignored in one-shot mode.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Runs until completion, interruption or the first error.
    ///
    /// `interrupt` is only polled between cycles; a running cycle always
    /// finishes first.
    pub async fn run<F>(mut self, interrupt: F) -> Result<RunReport, Error>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let result = self.sample_loop(interrupt, started).await;

        self.state = match &result {
            Ok(state) => *state,
            Err(_) => SchedulerState::Failed,
        };
        info!(
            "Sampling of {} {} after {} cycles",
            self.target, self.state, self.cycles
        );

        let closed = self.sink.close();
        match (result, closed) {
            (Ok(state), Ok(())) => Ok(RunReport {
                state,
                cycles: self.cycles,
                snapshots: self.snapshots,
                elapsed: started.elapsed(),
            }),
            (Ok(_), Err(e)) => Err(Error::Close(e)),
            (Err(e), Err(close_err)) => {
                warn!("Error closing output: {}", close_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    async fn sample_loop<F>(&mut self, interrupt: F, started: Instant) -> Result<SchedulerState, Error>
    where
        F: Future<Output = ()>,
    {
        self.state = SchedulerState::Sampling;
        info!(
            "Sampling {} every {:?} for {:?}",
            self.target, self.interval, self.duration
        );

        self.cycle()?;
        if self.interval.is_zero() {
            return Ok(SchedulerState::Completed);
        }

        // Instants too far out to represent are treated as never reached.
        let mut next_tick = started.checked_add(self.interval);
        // Armed once; never reset by ticks.
        let deadline = match self.duration {
            d if d.is_zero() => None,
            d => started.checked_add(d),
        };
        if next_tick.is_none() || (!self.duration.is_zero() && deadline.is_none()) {
            debug!("Interval or duration beyond the clock range, treating it as unbounded");
        }
        let expiry = sleep_until_or_never(deadline);
        tokio::pin!(expiry);
        tokio::pin!(interrupt);

        loop {
            tokio::select! {
                biased;
                _ = &mut interrupt => {
                    info!("Interrupt received");
                    return Ok(SchedulerState::Interrupted);
                }
                _ = sleep_until_or_never(next_tick) => {
                    let fired = Instant::now();
                    // A tick landing after the deadline (slow cycles) must not
                    // keep the loop alive.
                    if deadline.is_some_and(|d| fired > d) {
                        return Ok(SchedulerState::Completed);
                    }
                    // Missed ticks are not replayed; a late tick shifts the schedule.
                    next_tick = next_tick
                        .map(|t| t.max(fired))
                        .and_then(|t| t.checked_add(self.interval));
                    self.cycle()?;
                }
                _ = &mut expiry => {
                    info!("Duration of {:?} elapsed", self.duration);
                    return Ok(SchedulerState::Completed);
                }
            }
        }
    }

    /// One collection followed by one export.
    fn cycle(&mut self) -> Result<(), Error> {
        let batch = self.collect_blocking().map_err(|source| Error::Collect {
            target: self.target.to_string(),
            source,
        })?;

        if batch.is_empty() {
            warn!("No running process matches {}", self.target);
        }

        self.sink.export(&batch).map_err(|source| Error::Export {
            target: self.target.to_string(),
            source,
        })?;

        self.cycles += 1;
        self.snapshots += batch.len() as u64;
        debug!(
            "Cycle {} exported {} snapshots for {}",
            self.cycles,
            batch.len(),
            self.target
        );
        Ok(())
    }

    /// Provider calls block on /proc reads (and a rayon scan for names), so
    /// the worker is handed off first where the runtime allows it.
    fn collect_blocking(&self) -> Result<Vec<ProcessMetrics>, CollectError> {
        let collect = || self.target.collect(&self.provider);
        match Handle::try_current().map(|h| h.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => task::block_in_place(collect),
            _ => collect(),
        }
    }
}

/// Sleeps until `deadline`; `None` never completes.
async fn sleep_until_or_never(deadline: Option<Instant>) {
    match deadline {
        Some(d) => time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
