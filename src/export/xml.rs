//! XML encoding.
//!
//! A file holds exactly one document: the prologue (declaration plus the
//! opening root tag) is written once when the sink is opened, records are
//! appended as `<metrics>` elements, and the root is closed when the sink
//! is closed.

use std::fmt::Write as FmtWrite;
use std::io::Write;

use crate::error::ExportError;
use crate::snapshot::ProcessMetrics;

pub const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
pub const ROOT_ELEMENT: &str = "process_metrics";
pub const RECORD_ELEMENT: &str = "metrics";

const INDENT: &str = "  ";

pub fn write_prologue(w: &mut dyn Write) -> Result<(), ExportError> {
    write!(w, "{}\n<{}>\n", DECLARATION, ROOT_ELEMENT)?;
    Ok(())
}

pub fn write_epilogue(w: &mut dyn Write) -> Result<(), ExportError> {
    writeln!(w, "</{}>", ROOT_ELEMENT)?;
    Ok(())
}

/// One `<metrics>` element per snapshot. Without `pretty` each element is
/// written on a single line.
pub fn write_records(
    batch: &[ProcessMetrics],
    w: &mut dyn Write,
    pretty: bool,
) -> Result<(), ExportError> {
    let mut out = String::new();
    for m in batch {
        let fields: [(&str, String); 9] = [
            ("timestamp", m.timestamp.to_rfc3339()),
            ("pid", m.pid.to_string()),
            ("name", escape(&m.name)),
            ("cpu_percent", m.cpu_percent.to_string()),
            ("memory_mb", m.memory_mb.to_string()),
            ("io_read_bytes", m.io_read_bytes.to_string()),
            ("io_write_bytes", m.io_write_bytes.to_string()),
            ("thread_count", m.thread_count.to_string()),
            ("fd_count", m.fd_count.to_string()),
        ];

        if pretty {
            writeln!(out, "{}<{}>", INDENT, RECORD_ELEMENT).ok();
            for (tag, value) in &fields {
                writeln!(out, "{0}{0}<{1}>{2}</{1}>", INDENT, tag, value).ok();
            }
            writeln!(out, "{}</{}>", INDENT, RECORD_ELEMENT).ok();
        } else {
            write!(out, "<{}>", RECORD_ELEMENT).ok();
            for (tag, value) in &fields {
                write!(out, "<{0}>{1}</{0}>", tag, value).ok();
            }
            writeln!(out, "</{}>", RECORD_ELEMENT).ok();
        }
    }
    w.write_all(out.as_bytes())?;
    Ok(())
}

/// Escapes markup characters. Tab, LF and CR become character references so a
/// compact record stays on one line; other C0 controls are not allowed in
/// XML 1.0 and are dropped.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c if c < '\u{20}' => {}
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::sample;

    #[test]
    fn test_prologue_and_epilogue() {
        let mut buf = Vec::new();
        write_prologue(&mut buf).unwrap();
        write_epilogue(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<process_metrics>\n</process_metrics>\n"
        );
    }

    #[test]
    fn test_compact_record() {
        let mut buf = Vec::new();
        write_records(&[sample(42, "worker")], &mut buf, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("<metrics><timestamp>2024-03-09T14:05:07"));
        assert!(text.contains("<pid>42</pid><name>worker</name>"));
        assert!(text.contains("<memory_mb>256.5</memory_mb>"));
        assert!(text.ends_with("<fd_count>23</fd_count></metrics>\n"));
    }

    #[test]
    fn test_pretty_changes_whitespace_only() {
        let batch = [sample(1, "a"), sample(2, "b")];
        let mut compact = Vec::new();
        let mut pretty = Vec::new();
        write_records(&batch, &mut compact, false).unwrap();
        write_records(&batch, &mut pretty, true).unwrap();

        let pretty = String::from_utf8(pretty).unwrap();
        assert!(pretty.contains("\n    <pid>1</pid>\n"));

        let strip = |s: &str| -> String { s.lines().map(str::trim).collect() };
        assert_eq!(strip(&String::from_utf8(compact).unwrap()), strip(&pretty));
    }

    #[test]
    fn test_name_is_escaped() {
        let mut buf = Vec::new();
        write_records(&[sample(1, "a<b>&\"c'")], &mut buf, false).unwrap();
        assert!(String::from_utf8(buf)
            .unwrap()
            .contains("<name>a&lt;b&gt;&amp;&quot;c&apos;</name>"));
    }

    #[test]
    fn test_control_characters_in_name() {
        assert_eq!(escape("a\u{1}b\u{1b}[0mc"), "ab[0mc");
        assert_eq!(escape("x\ty\nz\r"), "x&#9;y&#10;z&#13;");

        let mut buf = Vec::new();
        write_records(&[sample(1, "bad\u{0}\nname")], &mut buf, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("<name>bad&#10;name</name>"));
    }
}
