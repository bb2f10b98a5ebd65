//! Snapshot model shared by the collector and the exporters.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Value of `cpu_percent` / `memory_mb` when the reading failed.
pub const UNAVAILABLE_F64: f64 = -1.0;

/// Value of `thread_count` / `fd_count` when the reading failed.
pub const UNAVAILABLE_COUNT: i32 = -1;

/// One observation of one process.
///
/// Field order here is the field order of every output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub timestamp: DateTime<Local>,
    pub pid: i32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
    pub thread_count: i32,
    pub fd_count: i32,
}

impl ProcessMetrics {
    /// Snapshot with every metric set to its "unavailable" value.
    pub fn unavailable(pid: i32, name: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            pid,
            name: name.into(),
            cpu_percent: UNAVAILABLE_F64,
            memory_mb: UNAVAILABLE_F64,
            io_read_bytes: 0,
            io_write_bytes: 0,
            thread_count: UNAVAILABLE_COUNT,
            fd_count: UNAVAILABLE_COUNT,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Deterministic snapshot for encoder tests.
    pub fn sample(pid: i32, name: &str) -> ProcessMetrics {
        ProcessMetrics {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
            pid,
            name: name.to_string(),
            cpu_percent: 12.3456,
            memory_mb: 256.5,
            io_read_bytes: 4096,
            io_write_bytes: 1024,
            thread_count: 8,
            fd_count: 23,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_uses_sentinels() {
        let m = ProcessMetrics::unavailable(7, "init", Local::now());
        assert_eq!(m.cpu_percent, UNAVAILABLE_F64);
        assert_eq!(m.memory_mb, UNAVAILABLE_F64);
        assert_eq!(m.io_read_bytes, 0);
        assert_eq!(m.io_write_bytes, 0);
        assert_eq!(m.thread_count, UNAVAILABLE_COUNT);
        assert_eq!(m.fd_count, UNAVAILABLE_COUNT);
    }

    #[test]
    fn test_json_field_order() {
        let json = serde_json::to_string(&fixtures::sample(1, "a")).unwrap();
        let keys = [
            "timestamp",
            "pid",
            "name",
            "cpu_percent",
            "memory_mb",
            "io_read_bytes",
            "io_write_bytes",
            "thread_count",
            "fd_count",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| json.find(&format!("\"{}\"", k)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
