//! CSV encoding.

use std::fmt::Write as FmtWrite;
use std::io::Write;

use crate::error::ExportError;
use crate::snapshot::ProcessMetrics;

pub const HEADER: [&str; 9] = [
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

/// Local time, second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn write_header(w: &mut dyn Write) -> Result<(), ExportError> {
    writeln!(w, "{}", HEADER.join(","))?;
    Ok(())
}

/// One row per snapshot.
pub fn write_rows(batch: &[ProcessMetrics], w: &mut dyn Write) -> Result<(), ExportError> {
    let mut out = String::new();
    for m in batch {
        writeln!(
            out,
            "{},{},{},{:.2},{:.2},{},{},{},{}",
            m.timestamp.format(TIMESTAMP_FORMAT),
            m.pid,
            quote(&m.name),
            m.cpu_percent,
            m.memory_mb,
            m.io_read_bytes,
            m.io_write_bytes,
            m.thread_count,
            m.fd_count
        )
        .ok();
    }
    w.write_all(out.as_bytes())?;
    Ok(())
}

/// Quotes a field containing a separator, quote or line break.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
