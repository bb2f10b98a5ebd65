//! CLI arguments for proctrail.
//!
//! Every sampling option is optional here so that a config file can supply
//! it; defaults are applied in [`crate::config`].

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::export::Format;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for --show-config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "proctrail",
    about = "Record process performance metrics to CSV, JSON, JSON Lines or XML",
    long_about = "Record process performance metrics to CSV, JSON, JSON Lines or XML.\n\n\
                  Samples CPU usage, resident memory, disk I/O, thread count and open file \
                  descriptors of a process (by PID) or of every process with a given name, \
                  once or at a fixed interval, and appends all samples to a single file.",
    version,
    propagate_version = true
)]
pub struct Args {
    /// Process ID to monitor
    #[arg(short = 'p', long)]
    pub pid: Option<i32>,

    /// Process name to monitor (exact match, all matching processes)
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Sampling interval in seconds (0 for one-time sampling)
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Total duration to monitor in seconds (0 for indefinite)
    #[arg(short = 'd', long)]
    pub duration: Option<u64>,

    /// Output format [default: json]
    #[arg(short = 'f', long, value_enum, ignore_case = true)]
    pub format: Option<Format>,

    /// Output file path, "-" for stdout (default: ./proctrail_<timestamp>.<ext>)
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Pretty print output (for json and xml)
    #[arg(long)]
    pub pretty: bool,

    /// Do not show the progress spinner
    #[arg(long)]
    pub no_progress: bool,

    /// Read process information from an alternative procfs mount
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Log level [default: warn]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let args = Args::try_parse_from([
            "proctrail", "-p", "42", "-i", "2", "-d", "10", "-f", "CSV", "-o", "out.csv",
        ])
        .unwrap();
        assert_eq!(args.pid, Some(42));
        assert_eq!(args.name, None);
        assert_eq!(args.interval, Some(2));
        assert_eq!(args.duration, Some(10));
        assert_eq!(args.format, Some(Format::Csv));
        assert_eq!(args.output.as_deref(), Some("out.csv"));
        assert!(!args.pretty);
    }

    #[test]
    fn test_long_flags() {
        let args = Args::try_parse_from([
            "proctrail",
            "--name",
            "nginx",
            "--format",
            "xml",
            "--pretty",
            "--no-progress",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.name.as_deref(), Some("nginx"));
        assert_eq!(args.format, Some(Format::Xml));
        assert!(args.pretty);
        assert!(args.no_progress);
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert_eq!(args.config_format, ConfigFormat::Yaml);
    }

    #[test]
    fn test_rejects_negative_interval_and_unknown_format() {
        assert!(Args::try_parse_from(["proctrail", "-p", "1", "-i", "-1"]).is_err());
        assert!(Args::try_parse_from(["proctrail", "-p", "1", "-f", "yaml"]).is_err());
    }
}
