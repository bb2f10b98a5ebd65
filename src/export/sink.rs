//! The single output destination.
//!
//! [`SinkWriter`] is the only component that touches the output handle.
//! Header/prologue bookkeeping lives under the same mutex as the handle, so
//! "write header if not yet written" and the batch write form one critical
//! section.

use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Encoder, Format};
use crate::error::{ExportError, SinkError};
use crate::snapshot::ProcessMetrics;

/// Prefix of synthesized output file names.
pub const FILE_PREFIX: &str = "proctrail";

/// Where exported bytes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// Interprets an `--output` value: `-` is stdout, anything else is a file
    /// path resolved by [`resolve_output_path`].
    pub fn from_arg(output: &str, format: Format, now: DateTime<Local>) -> Self {
        if output == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(resolve_output_path(output, format, now))
        }
    }
}

/// Resolves the output file path.
///
/// An empty value or a path without extension (taken as a directory) gets a
/// synthesized `proctrail_<YYYYMMDD_HHMMSS>.<ext>` file name.
pub fn resolve_output_path(output: &str, format: Format, now: DateTime<Local>) -> PathBuf {
    let path = Path::new(output);
    if !output.is_empty() && path.extension().is_some() {
        return path.to_path_buf();
    }

    let file_name = format!(
        "{}_{}.{}",
        FILE_PREFIX,
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    );
    let dir = if output.is_empty() { Path::new(".") } else { path };
    dir.join(file_name)
}

struct SinkState {
    out: Option<BufWriter<Box<dyn Write + Send>>>,
    /// CSV header or XML prologue is present in the output.
    header_written: bool,
    /// This writer opened the XML root element and owes its closing tag.
    document_open: bool,
}

/// Append-only writer shared by everything that exports batches.
pub struct SinkWriter {
    encoder: Encoder,
    path: Option<PathBuf>,
    state: Mutex<SinkState>,
}

impl SinkWriter {
    pub fn open(target: &OutputTarget, encoder: Encoder) -> Result<Self, SinkError> {
        match target {
            OutputTarget::Stdout => Self::stdout(encoder),
            OutputTarget::File(path) => Self::create(path, encoder),
        }
    }

    /// Opens `path` for appending, creating it and its parent directories
    /// if needed.
    pub fn create(path: &Path, encoder: Encoder) -> Result<Self, SinkError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| SinkError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| SinkError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        // Appending to existing output must not repeat the header.
        let fresh = file.metadata().map(|m| m.len() == 0).unwrap_or(true);
        debug!(
            "Opened output file {} ({})",
            path.display(),
            if fresh { "new" } else { "appending" }
        );

        Self::init(Box::new(file), Some(path.to_path_buf()), encoder, fresh)
    }

    pub fn stdout(encoder: Encoder) -> Result<Self, SinkError> {
        Self::init(Box::new(io::stdout()), None, encoder, true)
    }

    /// Wraps an arbitrary writer, treated as empty.
    pub fn from_writer(writer: Box<dyn Write + Send>, encoder: Encoder) -> Result<Self, SinkError> {
        Self::init(writer, None, encoder, true)
    }

    fn init(
        writer: Box<dyn Write + Send>,
        path: Option<PathBuf>,
        encoder: Encoder,
        fresh: bool,
    ) -> Result<Self, SinkError> {
        let mut out = BufWriter::new(writer);
        let mut header_written = !fresh;
        let mut document_open = false;

        // The XML prologue is written here and nowhere else.
        if fresh && matches!(encoder, Encoder::Xml { .. }) {
            encoder.write_preamble(&mut out)?;
            out.flush().map_err(ExportError::from)?;
            header_written = true;
            document_open = true;
        }

        Ok(Self {
            encoder,
            path,
            state: Mutex::new(SinkState {
                out: Some(out),
                header_written,
                document_open,
            }),
        })
    }

    /// File path, or `None` for stdout and custom writers.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn encoder(&self) -> Encoder {
        self.encoder
    }

    /// Appends one batch. Concurrent callers are serialized; a batch is never
    /// interleaved with another.
    pub fn export(&self, batch: &[ProcessMetrics]) -> Result<(), ExportError> {
        let mut guard = self.state.lock().map_err(|_| ExportError::Poisoned)?;
        let state = &mut *guard;
        let out = state.out.as_mut().ok_or(ExportError::Closed)?;

        if !state.header_written {
            if self.encoder.write_preamble(out)? {
                debug!("Wrote {} header", self.encoder.format());
            }
            state.header_written = true;
        }

        self.encoder.encode(batch, out)?;
        out.flush()?;
        Ok(())
    }

    /// Closes the output. Later calls are no-ops.
    pub fn close(&self) -> Result<(), ExportError> {
        let mut guard = self.state.lock().map_err(|_| ExportError::Poisoned)?;
        close_state(&mut guard, self.encoder)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.out.is_none()).unwrap_or(true)
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.out.is_some() {
            if let Err(e) = close_state(state, self.encoder) {
                warn!("Error closing output: {}", e);
            }
        }
    }
}

fn close_state(state: &mut SinkState, encoder: Encoder) -> Result<(), ExportError> {
    let Some(mut out) = state.out.take() else {
        return Ok(());
    };
    if state.document_open {
        state.document_open = false;
        encoder.write_trailer(&mut out)?;
    }
    out.flush()?;
    info!("Output closed");
    Ok(())
}
