//! JSON and JSON Lines encoding.

use std::io::Write;

use crate::error::ExportError;
use crate::snapshot::ProcessMetrics;

/// Encodes the batch as a single array followed by a newline.
pub fn write_array(
    batch: &[ProcessMetrics],
    w: &mut dyn Write,
    pretty: bool,
) -> Result<(), ExportError> {
    let mut out = if pretty {
        serde_json::to_vec_pretty(batch)?
    } else {
        serde_json::to_vec(batch)?
    };
    out.push(b'\n');
    w.write_all(&out)?;
    Ok(())
}

/// Encodes each snapshot as a complete object on its own line.
pub fn write_lines(batch: &[ProcessMetrics], w: &mut dyn Write) -> Result<(), ExportError> {
    let mut out = Vec::new();
    for m in batch {
        serde_json::to_writer(&mut out, m)?;
        out.push(b'\n');
    }
    w.write_all(&out)?;
    Ok(())
}
