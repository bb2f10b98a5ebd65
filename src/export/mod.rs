//! Output formats and the sink that all batches are appended to.
//!
//! - `csv`: one header line per file, one row per snapshot
//! - `json`: one array per export call
//! - `jsonl`: one object per line
//! - `xml`: one document, `<metrics>` element per snapshot

pub mod csv;
pub mod json;
pub mod sink;
pub mod xml;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

use crate::error::ExportError;
use crate::snapshot::ProcessMetrics;

pub use sink::{resolve_output_path, OutputTarget, SinkWriter};

/// Supported serializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    Json,
    Jsonl,
    Xml,
}

impl Format {
    /// Canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Jsonl => "jsonl",
            Format::Xml => "xml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Format encoder, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    Csv,
    Json { pretty: bool },
    JsonLines,
    Xml { pretty: bool },
}

impl Encoder {
    /// `pretty` only affects JSON and XML.
    pub fn new(format: Format, pretty: bool) -> Self {
        match format {
            Format::Csv => Encoder::Csv,
            Format::Json => Encoder::Json { pretty },
            Format::Jsonl => Encoder::JsonLines,
            Format::Xml => Encoder::Xml { pretty },
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Encoder::Csv => Format::Csv,
            Encoder::Json { .. } => Format::Json,
            Encoder::JsonLines => Format::Jsonl,
            Encoder::Xml { .. } => Format::Xml,
        }
    }

    /// Writes the once-per-file preamble (CSV header or XML prologue).
    /// Returns `false` for formats without one.
    pub fn write_preamble(&self, w: &mut dyn Write) -> Result<bool, ExportError> {
        match self {
            Encoder::Csv => csv::write_header(w).map(|_| true),
            Encoder::Xml { .. } => xml::write_prologue(w).map(|_| true),
            Encoder::Json { .. } | Encoder::JsonLines => Ok(false),
        }
    }

    /// Writes whatever closes the document opened by `write_preamble`.
    pub fn write_trailer(&self, w: &mut dyn Write) -> Result<(), ExportError> {
        match self {
            Encoder::Xml { .. } => xml::write_epilogue(w),
            _ => Ok(()),
        }
    }

    /// Encodes one batch.
    pub fn encode(&self, batch: &[ProcessMetrics], w: &mut dyn Write) -> Result<(), ExportError> {
        match *self {
            Encoder::Csv => csv::write_rows(batch, w),
            Encoder::Json { pretty } => json::write_array(batch, w, pretty),
            Encoder::JsonLines => json::write_lines(batch, w),
            Encoder::Xml { pretty } => xml::write_records(batch, w, pretty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(Format::Csv.extension(), "csv");
        assert_eq!(Format::Json.extension(), "json");
        assert_eq!(Format::Jsonl.extension(), "jsonl");
        assert_eq!(Format::Xml.extension(), "xml");
    }

    #[test]
    fn test_encoder_round_trips_format() {
        for format in [Format::Csv, Format::Json, Format::Jsonl, Format::Xml] {
            assert_eq!(Encoder::new(format, true).format(), format);
        }
    }

    #[test]
    fn test_pretty_ignored_for_csv_and_jsonl() {
        assert_eq!(Encoder::new(Format::Csv, true), Encoder::Csv);
        assert_eq!(Encoder::new(Format::Jsonl, true), Encoder::JsonLines);
    }

    #[test]
    fn test_format_parses_case_insensitively() {
        assert_eq!(Format::from_str("JSONL", true).unwrap(), Format::Jsonl);
        assert!(Format::from_str("yaml", true).is_err());
    }

    #[test]
    fn test_preamble_only_for_csv_and_xml() {
        let mut buf = Vec::new();
        assert!(!Encoder::JsonLines.write_preamble(&mut buf).unwrap());
        assert!(buf.is_empty());
        assert!(Encoder::Csv.write_preamble(&mut buf).unwrap());
        assert!(!buf.is_empty());
    }
}
