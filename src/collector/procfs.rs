//! Per-process metrics collection from the /proc filesystem.
//!
//! Every metric is read from its own file so that one unreadable file only
//! degrades the matching field. Only an unresolvable process (missing
//! directory or unreadable name) fails the call.

use chrono::Local;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::MetricsProvider;
use crate::error::CollectError;
use crate::snapshot::{ProcessMetrics, UNAVAILABLE_COUNT, UNAVAILABLE_F64};

/// Default mount point of procfs.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Fallback USER_HZ when sysconf is unavailable.
const DEFAULT_CLK_TCK: u64 = 100;

/// The kernel truncates `comm` to this many bytes.
const TASK_COMM_LEN: usize = 15;

/// Clock-tick counters from /proc/<pid>/stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StatTimes {
    utime: u64,
    stime: u64,
    starttime: u64,
}

/// Values of interest from /proc/<pid>/status.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct StatusInfo {
    vm_rss_kb: Option<u64>,
    threads: Option<i32>,
}

/// [`MetricsProvider`] backed by /proc.
pub struct ProcfsCollector {
    root: PathBuf,
    clk_tck: u64,
}

impl Default for ProcfsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsCollector {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_PROC_ROOT)
    }

    /// Reads from an alternative procfs mount, e.g. `/host/proc`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clk_tck: clock_ticks_per_second(),
        }
    }

    /// Overrides the detected clock tick rate.
    pub fn with_clock_ticks(mut self, clk_tck: u64) -> Self {
        self.clk_tck = clk_tck.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Builds the snapshot for one process directory. Fails only when the
    /// process name cannot be read.
    fn collect_metrics(&self, pid: i32, proc_path: &Path) -> Result<ProcessMetrics, String> {
        let name = read_process_name(proc_path)
            .ok_or_else(|| "failed to get process name".to_string())?;
        let timestamp = Local::now();

        let mut metrics = ProcessMetrics::unavailable(pid, name, timestamp);
        metrics.cpu_percent = self.cpu_percent(pid, proc_path);

        match read_lossy(&proc_path.join("status")) {
            Ok(content) => {
                let status = parse_status(&content);
                if let Some(kb) = status.vm_rss_kb {
                    metrics.memory_mb = kb as f64 / 1024.0;
                }
                if let Some(threads) = status.threads {
                    metrics.thread_count = threads;
                }
            }
            Err(e) => debug!("Failed to read status for pid {}: {}", pid, e),
        }

        match fs::read_to_string(proc_path.join("io")) {
            Ok(content) => {
                let (read, write) = parse_io_bytes(&content);
                metrics.io_read_bytes = read;
                metrics.io_write_bytes = write;
            }
            Err(e) => debug!("Failed to read io for pid {}: {}", pid, e),
        }

        match fs::read_dir(proc_path.join("fd")) {
            Ok(entries) => {
                metrics.fd_count = i32::try_from(entries.count()).unwrap_or(i32::MAX);
            }
            Err(e) => {
                debug!("Failed to list fds for pid {}: {}", pid, e);
                metrics.fd_count = UNAVAILABLE_COUNT;
            }
        }

        Ok(metrics)
    }

    /// CPU usage in percent of one core, averaged over the process lifetime.
    ///
    /// Computed from scratch on every call: total CPU seconds divided by the
    /// seconds elapsed since the process started.
    fn cpu_percent(&self, pid: i32, proc_path: &Path) -> f64 {
        let times = match read_lossy(&proc_path.join("stat"))
            .ok()
            .and_then(|c| parse_stat_times(&c))
        {
            Some(t) => t,
            None => {
                debug!("Failed to read CPU time for pid {}", pid);
                return UNAVAILABLE_F64;
            }
        };
        let uptime = match self.read_uptime() {
            Some(uptime) => uptime,
            None => {
                debug!("Failed to read uptime for pid {}", pid);
                return UNAVAILABLE_F64;
            }
        };

        let clk_tck = self.clk_tck as f64;
        lifetime_cpu_percent(
            (times.utime + times.stime) as f64 / clk_tck,
            uptime - times.starttime as f64 / clk_tck,
        )
    }

    fn read_uptime(&self) -> Option<f64> {
        let content = fs::read_to_string(self.root.join("uptime")).ok()?;
        content.split_whitespace().next()?.parse().ok()
    }

    /// Numeric entries of the proc root.
    fn list_pids(&self) -> Result<Vec<(i32, PathBuf)>, CollectError> {
        let entries = fs::read_dir(&self.root).map_err(CollectError::ListFailed)?;
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let pid = match path
                .file_name()
                .and_then(|s| s.to_str())
                .filter(|s| s.chars().all(|c| c.is_ascii_digit()))
                .and_then(|s| s.parse::<i32>().ok())
            {
                Some(pid) => pid,
                None => continue,
            };
            out.push((pid, path));
        }
        Ok(out)
    }
}

impl MetricsProvider for ProcfsCollector {
    fn collect_by_pid(&self, pid: i32) -> Result<ProcessMetrics, CollectError> {
        let proc_path = self.root.join(pid.to_string());
        if pid <= 0 || !proc_path.is_dir() {
            return Err(CollectError::NotFound {
                pid,
                reason: "no such process".into(),
            });
        }
        self.collect_metrics(pid, &proc_path)
            .map_err(|reason| CollectError::NotFound { pid, reason })
    }

    fn collect_by_name(&self, name: &str) -> Result<Vec<ProcessMetrics>, CollectError> {
        let entries = self.list_pids()?;
        debug!("Scanning {} process entries for '{}'", entries.len(), name);

        let mut results: Vec<ProcessMetrics> = entries
            .par_iter()
            .filter_map(|(pid, path)| {
                // Processes may exit mid-scan; those are skipped.
                if read_process_name(path)? != name {
                    return None;
                }
                match self.collect_metrics(*pid, path) {
                    Ok(m) => Some(m),
                    Err(e) => {
                        debug!("Skipping process {}: {}", pid, e);
                        None
                    }
                }
            })
            .collect();
        results.sort_by_key(|m| m.pid);

        Ok(results)
    }
}

/// Reads process name from comm, or from cmdline when comm is empty or truncated.
///
/// Names are raw bytes to the kernel; invalid UTF-8 is replaced, never fatal.
fn read_process_name(proc_path: &Path) -> Option<String> {
    let comm = fs::read(proc_path.join("comm"))
        .ok()
        .map(|mut bytes| {
            if bytes.last() == Some(&b'\n') {
                bytes.pop();
            }
            bytes
        })
        .filter(|bytes| !bytes.is_empty());

    let from_cmdline = || -> Option<String> {
        let content = fs::read(proc_path.join("cmdline")).ok()?;
        let argv0 = content.split(|&b| b == 0u8).next()?;
        let name = argv0.rsplit(|&b| b == b'/').next()?;
        (!name.is_empty()).then(|| String::from_utf8_lossy(name).into_owned())
    };

    match comm {
        Some(bytes) if bytes.len() >= TASK_COMM_LEN => {
            let comm = String::from_utf8_lossy(&bytes).into_owned();
            match from_cmdline() {
                Some(full) if full.starts_with(&comm) => Some(full),
                _ => Some(comm),
            }
        }
        Some(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        None => from_cmdline(),
    }
}

/// Reads a text file whose content may embed the raw process name.
fn read_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// `cpu_seconds` over `elapsed_seconds`, in percent. A process younger than
/// one clock tick reports 0.
fn lifetime_cpu_percent(cpu_seconds: f64, elapsed_seconds: f64) -> f64 {
    if elapsed_seconds > 0.0 {
        cpu_seconds / elapsed_seconds * 100.0
    } else {
        0.0
    }
}

/// Parses utime, stime and starttime (in clock ticks) from /proc/<pid>/stat.
///
/// The comm field may contain spaces and parentheses, so parsing starts
/// after the last ')'.
fn parse_stat_times(content: &str) -> Option<StatTimes> {
    let rest = &content[content.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // fields[0] is field 3 (state) in proc(5).
    Some(StatTimes {
        utime: fields.get(11)?.parse().ok()?,
        stime: fields.get(12)?.parse().ok()?,
        starttime: fields.get(19)?.parse().ok()?,
    })
}

fn parse_status(content: &str) -> StatusInfo {
    let mut info = StatusInfo::default();
    for line in content.lines() {
        if let Some(v) = line.strip_prefix("VmRSS:") {
            info.vm_rss_kb = v.split_whitespace().next().and_then(|s| s.parse().ok());
        } else if let Some(v) = line.strip_prefix("Threads:") {
            info.threads = v.trim().parse().ok();
        }
    }
    info
}

/// Storage-layer read_bytes / write_bytes from /proc/<pid>/io.
fn parse_io_bytes(content: &str) -> (u64, u64) {
    let mut read = 0;
    let mut write = 0;
    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim().parse().unwrap_or(0);
            match key.trim() {
                "read_bytes" => read = value,
                "write_bytes" => write = value,
                _ => {}
            }
        }
    }
    (read, write)
}

fn clock_ticks_per_second() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as u64
    } else {
        DEFAULT_CLK_TCK
    }
}
