//! proctrail - record process performance metrics to a file.
//!
//! A [`Scheduler`] samples a [`Target`] through a [`MetricsProvider`] once or
//! at a fixed interval and appends each batch to a [`SinkWriter`], which
//! encodes it as CSV, JSON, JSON Lines or XML.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod progress;
pub mod scheduler;
pub mod snapshot;

pub use collector::{MetricsProvider, ProcfsCollector, Target};
pub use config::{Config, Settings};
pub use error::{CollectError, ConfigError, Error, ExportError, SinkError};
pub use export::{Encoder, Format, OutputTarget, SinkWriter};
pub use scheduler::{RunReport, Scheduler, SchedulerState};
pub use snapshot::ProcessMetrics;
