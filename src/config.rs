//! Configuration management.
//!
//! Precedence: CLI (if provided) > config file > default. The merged
//! [`Config`] is validated into immutable [`Settings`] before any output is
//! opened.

use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Args, ConfigFormat, LogLevel};
use crate::collector::procfs::DEFAULT_PROC_ROOT;
use crate::collector::Target;
use crate::error::ConfigError;
use crate::export::{Format, OutputTarget};

// Default configuration constants
pub const DEFAULT_INTERVAL_SECS: u64 = 0;
pub const DEFAULT_DURATION_SECS: u64 = 0;
pub const DEFAULT_FORMAT: Format = Format::Json;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Searched in order when no --config is given.
const DEFAULT_CONFIG_PATHS: [&str; 8] = [
    "./proctrail.yaml",
    "./proctrail.yml",
    "./proctrail.json",
    "./proctrail.toml",
    "/etc/proctrail/proctrail.yaml",
    "/etc/proctrail/proctrail.yml",
    "/etc/proctrail/proctrail.json",
    "/etc/proctrail/proctrail.toml",
];

/// Config file contents, also used as the merged effective configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    // Sampling
    /// Seconds between samples, 0 for a single sample
    pub interval: Option<u64>,
    /// Total seconds to sample, 0 for no limit
    pub duration: Option<u64>,

    // Output
    pub format: Option<Format>,
    pub output: Option<String>,
    pub pretty: Option<bool>,
    pub progress: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // Collection
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pid: None,
            name: None,
            interval: Some(DEFAULT_INTERVAL_SECS),
            duration: Some(DEFAULT_DURATION_SECS),
            format: Some(DEFAULT_FORMAT),
            output: Some(String::new()),
            pretty: Some(false),
            progress: Some(true),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
        }
    }
}

impl Config {
    /// Fills fields missing from a config file with defaults.
    fn with_defaults(self) -> Self {
        let d = Config::default();
        Self {
            pid: self.pid,
            name: self.name,
            interval: self.interval.or(d.interval),
            duration: self.duration.or(d.duration),
            format: self.format.or(d.format),
            output: self.output.or(d.output),
            pretty: self.pretty.or(d.pretty),
            progress: self.progress.or(d.progress),
            log_level: self.log_level.or(d.log_level),
            proc_root: self.proc_root.or(d.proc_root),
        }
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub target: Target,
    pub interval: Duration,
    pub duration: Duration,
    pub format: Format,
    /// Raw `--output` value; see [`Settings::output_target`].
    pub output: String,
    pub pretty: bool,
    pub progress: bool,
    pub log_level: LogLevel,
    pub proc_root: PathBuf,
}

impl Settings {
    /// Validates the effective config.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let pid = cfg.pid.filter(|p| *p != 0);
        let name = cfg.name.as_deref().filter(|n| !n.is_empty());

        let target = match (pid, name) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingTarget),
            (None, None) => return Err(ConfigError::MissingTarget),
            (Some(pid), None) if pid < 0 => return Err(ConfigError::InvalidPid(pid)),
            (Some(pid), None) => Target::Pid(pid),
            (None, Some(name)) => Target::Name(name.to_string()),
        };

        Ok(Self {
            target,
            interval: Duration::from_secs(cfg.interval.unwrap_or(DEFAULT_INTERVAL_SECS)),
            duration: Duration::from_secs(cfg.duration.unwrap_or(DEFAULT_DURATION_SECS)),
            format: cfg.format.unwrap_or(DEFAULT_FORMAT),
            output: cfg.output.clone().unwrap_or_default(),
            pretty: cfg.pretty.unwrap_or(false),
            progress: cfg.progress.unwrap_or(true),
            log_level: parse_log_level(cfg.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL))?,
            proc_root: cfg
                .proc_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT)),
        })
    }

    /// Resolves where output goes, using `now` for synthesized file names.
    pub fn output_target(&self, now: DateTime<Local>) -> OutputTarget {
        OutputTarget::from_arg(&self.output, self.format, now)
    }
}

fn parse_log_level(s: &str) -> Result<LogLevel, ConfigError> {
    LogLevel::from_str(s, true).map_err(|_| ConfigError::InvalidLogLevel(s.to_string()))
}

/// Resolves configuration from CLI args, config file, and defaults
pub fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // A target on the CLI replaces the whole target from the file.
    if args.pid.is_some() || args.name.is_some() {
        config.pid = args.pid;
        config.name = args.name.clone();
    }

    if args.interval.is_some() {
        config.interval = args.interval;
    }
    if args.duration.is_some() {
        config.duration = args.duration;
    }
    if args.format.is_some() {
        config.format = args.format;
    }
    if args.output.is_some() {
        config.output = args.output.clone();
    }
    if args.pretty {
        config.pretty = Some(true);
    }
    if args.no_progress {
        config.progress = Some(false);
    }
    if let Some(level) = args.log_level {
        if let Some(value) = level.to_possible_value() {
            config.log_level = Some(value.get_name().to_string());
        }
    }
    if args.proc_root.is_some() {
        config.proc_root = args.proc_root.clone();
    }

    Ok(config)
}

/// The config file [`load_config`] reads: `explicit` if given, else the
/// first existing default location.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf),
    }
}

/// Loads a config file in YAML, JSON or TOML, chosen by extension.
///
/// Without an explicit path the default locations are searched; finding
/// none yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = config_path(path) else {
        return Ok(Config::default());
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let parse_err = |message: String| ConfigError::Parse {
        path: path.clone(),
        message,
    };

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        // Default to YAML
        _ => serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
    };

    Ok(config.with_defaults())
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, ConfigError> {
    let rendered = match format {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).map_err(|e| ConfigError::Render(e.to_string()))?
        }
        ConfigFormat::Toml => {
            toml::to_string_pretty(config).map_err(|e| ConfigError::Render(e.to_string()))?
        }
        ConfigFormat::Yaml => {
            serde_yaml::to_string(config).map_err(|e| ConfigError::Render(e.to_string()))?
        }
    };
    Ok(rendered)
}
