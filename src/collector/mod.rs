//! Metrics provider boundary.
//!
//! The scheduler only talks to [`MetricsProvider`]; the `/proc` reader in
//! [`procfs`] is the production implementation.

pub mod procfs;

use std::fmt;

use crate::error::CollectError;
use crate::snapshot::ProcessMetrics;

pub use procfs::ProcfsCollector;

/// Source of process snapshots. Every call is a fresh OS query.
pub trait MetricsProvider {
    /// Collects one snapshot for `pid`, failing with `NotFound` if the process
    /// cannot be resolved. Individual metric failures degrade to sentinels.
    fn collect_by_pid(&self, pid: i32) -> Result<ProcessMetrics, CollectError>;

    /// Collects one snapshot per process whose name equals `name`.
    /// No match yields an empty batch, not an error.
    fn collect_by_name(&self, name: &str) -> Result<Vec<ProcessMetrics>, CollectError>;
}

impl<P: MetricsProvider + ?Sized> MetricsProvider for &P {
    fn collect_by_pid(&self, pid: i32) -> Result<ProcessMetrics, CollectError> {
        (**self).collect_by_pid(pid)
    }

    fn collect_by_name(&self, name: &str) -> Result<Vec<ProcessMetrics>, CollectError> {
        (**self).collect_by_name(name)
    }
}

/// The process (or processes) being monitored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Pid(i32),
    Name(String),
}

impl Target {
    /// Runs one collection call and returns the resulting batch.
    pub fn collect<P: MetricsProvider + ?Sized>(
        &self,
        provider: &P,
    ) -> Result<Vec<ProcessMetrics>, CollectError> {
        match self {
            Target::Pid(pid) => provider.collect_by_pid(*pid).map(|m| vec![m]),
            Target::Name(name) => provider.collect_by_name(name),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Pid(pid) => write!(f, "PID {}", pid),
            Target::Name(name) => write!(f, "process '{}'", name),
        }
    }
}
