//! Stack frame decoding and signature derivation.

use tracing::debug;

use crate::ingest::fields::split_fields;
use crate::models::Frame;

/// Field order of a body (thread data) line.
pub const FRAME_FIELDS: &[&str] = &[
    "thread_num",
    "frame_num",
    "module_name",
    "function",
    "source",
    "source_line",
    "instruction",
];

/// Decode one body line into a [`Frame`].
///
/// Returns `None` when the line carries no usable frame number, since such a
/// line cannot be given an identity within its report. Every other field is
/// optional; a non-numeric `source_line` is treated as absent.
pub fn decode_frame_line(line: &str) -> Option<Frame> {
    let fields = split_fields(line, FRAME_FIELDS);
    let frame_num = fields.get("frame_num")?.trim().parse::<u32>().ok()?;

    let source_line = match fields.get("source_line") {
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => {
                debug!(source_line = raw, frame_num, "ignoring non-numeric source line");
                None
            }
        },
        None => None,
    };

    Some(Frame {
        report_id: None,
        thread_num: fields.get("thread_num").map(str::to_owned),
        frame_num,
        module_name: fields.get("module_name").map(str::to_owned),
        function: fields.get("function").map(str::to_owned),
        source: fields.get("source").map(str::to_owned),
        source_line,
        instruction: fields.get("instruction").map(str::to_owned),
    })
}

/// Canonical crash-location string for `frame`.
///
/// First match wins: the function name, then `source#line`, then
/// `module@instruction`, then `@instruction`. An absent instruction renders as
/// an empty string.
pub fn frame_signature(frame: &Frame) -> String {
    if let Some(function) = &frame.function {
        return function.clone();
    }
    if let (Some(source), Some(line)) = (&frame.source, frame.source_line) {
        return format!("{source}#{line}");
    }
    let instruction = frame.instruction.as_deref().unwrap_or_default();
    match &frame.module_name {
        Some(module) => format!("{module}@{instruction}"),
        None => format!("@{instruction}"),
    }
}

impl Frame {
    /// See [`frame_signature`].
    pub fn signature(&self) -> String {
        frame_signature(self)
    }
}
