//! Reader for the header section of a crash dump stream.
//!
//! The header is a sequence of `KEY|value|value|...` lines closed by the first
//! empty line. `OS`, `CPU` and `Crash` lines are mapped onto report fields;
//! lines with any other key are kept in the dump text only.

use std::io::BufRead;

use crate::errors::CrashStoreResult;
use crate::ingest::dump::DumpText;
use crate::ingest::fields::split_fields;

const HEADER_FIELDS: &[&str] = &["key", "first", "second", "third"];

/// Scalar report fields carried by the header section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportHeader {
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub cpu_name: Option<String>,
    pub cpu_info: Option<String>,
    pub reason: Option<String>,
    pub address: Option<String>,
    /// Thread id named by the last `Crash` line, verbatim.
    pub crashed_thread: Option<String>,
}

impl ReportHeader {
    /// Fold one terminator-free header line into the header. Returns `false`
    /// when the line's key is not recognised.
    pub fn apply_line(&mut self, line: &str) -> bool {
        let fields = split_fields(line, HEADER_FIELDS);
        let first = fields.get("first").map(str::to_owned);
        let second = fields.get("second").map(str::to_owned);
        match fields.get("key") {
            Some("OS") => {
                self.os_name = first;
                self.os_version = second;
            }
            Some("CPU") => {
                self.cpu_name = first;
                self.cpu_info = second;
            }
            Some("Crash") => {
                self.reason = first;
                self.address = second;
                self.crashed_thread = fields.get("third").map(str::to_owned);
            }
            _ => return false,
        }
        true
    }
}

/// Strip one trailing `\n` (and a `\r` before it) from `line`.
pub fn strip_terminator(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => line,
    }
}

/// Consume header lines from `reader` up to and including the first empty
/// line, appending each raw line to `dump` before it is interpreted.
///
/// Stops early at end of input; the header then holds whatever was seen.
pub fn read_header<R: BufRead>(reader: &mut R, dump: &mut DumpText) -> CrashStoreResult<ReportHeader> {
    let mut header = ReportHeader::default();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        dump.append(&line)?;
        let stripped = strip_terminator(&line);
        if stripped.is_empty() {
            break;
        }
        header.apply_line(stripped);
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Cursor};

    fn read(input: &str) -> (ReportHeader, String, Cursor<Vec<u8>>) {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut dump = DumpText::new();
        let header = read_header(&mut reader, &mut dump).unwrap();
        let text = dump.finalize(None).unwrap().data;
        (header, text, reader)
    }

    #[test]
    fn crash_line_sets_reason_address_and_thread() {
        let (header, _, _) = read("Crash|SIGSEGV|0xdead|0\n\n");
        assert_eq!(header.reason.as_deref(), Some("SIGSEGV"));
        assert_eq!(header.address.as_deref(), Some("0xdead"));
        assert_eq!(header.crashed_thread.as_deref(), Some("0"));
    }

    #[test]
    fn os_and_cpu_lines_populate_fields() {
        let (header, _, _) = read("OS|Linux|5.10\nCPU|x86|genuine\n\n");
        assert_eq!(header.os_name.as_deref(), Some("Linux"));
        assert_eq!(header.os_version.as_deref(), Some("5.10"));
        assert_eq!(header.cpu_name.as_deref(), Some("x86"));
        assert_eq!(header.cpu_info.as_deref(), Some("genuine"));
        assert_eq!(header.crashed_thread, None);
    }

    #[test]
    fn stops_at_first_empty_line_and_leaves_body_unread() {
        let input = "OS|Linux|5.10\n\n0|0|m|f|s|1|0x1\n";
        let (header, text, mut reader) = read(input);
        assert_eq!(header.os_name.as_deref(), Some("Linux"));
        assert_eq!(text, "OS|Linux|5.10\n\n");
        let mut rest = String::new();
        reader.read_line(&mut rest).unwrap();
        assert_eq!(rest, "0|0|m|f|s|1|0x1\n");
    }

    #[test]
    fn unknown_keys_are_kept_in_dump_only() {
        let input = "Module|libc.so|1.0\nOS|Linux|5.10\n\n";
        let (header, text, _) = read(input);
        assert_eq!(text, input);
        assert_eq!(header.os_name.as_deref(), Some("Linux"));
        assert_eq!(header.cpu_name, None);
        assert!(!ReportHeader::default().apply_line("Module|libc.so"));
    }

    #[test]
    fn crlf_terminators_are_stripped_but_preserved_in_dump() {
        let input = "OS|Windows NT|10.0\r\n\r\nrest";
        let (header, text, _) = read(input);
        assert_eq!(header.os_version.as_deref(), Some("10.0"));
        assert_eq!(text, "OS|Windows NT|10.0\r\n\r\n");
    }

    #[test]
    fn end_of_input_without_separator_returns_what_was_seen() {
        let (header, text, _) = read("Crash|SIGABRT|0x0|2");
        assert_eq!(header.reason.as_deref(), Some("SIGABRT"));
        assert_eq!(header.crashed_thread.as_deref(), Some("2"));
        assert_eq!(text, "Crash|SIGABRT|0x0|2");
    }

    #[test]
    fn short_crash_line_leaves_missing_tokens_absent() {
        let (header, _, _) = read("Crash|SIGILL\n\n");
        assert_eq!(header.reason.as_deref(), Some("SIGILL"));
        assert_eq!(header.address, None);
        assert_eq!(header.crashed_thread, None);
    }

    #[test]
    fn later_lines_overwrite_earlier_ones() {
        let (header, _, _) = read("OS|Linux|4.0\nOS|Linux|5.10\n\n");
        assert_eq!(header.os_version.as_deref(), Some("5.10"));
    }

    #[test]
    fn strip_terminator_variants() {
        assert_eq!(strip_terminator("abc\n"), "abc");
        assert_eq!(strip_terminator("abc\r\n"), "abc");
        assert_eq!(strip_terminator("abc"), "abc");
        assert_eq!(strip_terminator("\n"), "");
        assert_eq!(strip_terminator("abc\r"), "abc\r");
    }
}
