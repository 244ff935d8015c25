//! Shared typed models used across ingestion and storage layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Column widths
// ---------------------------------------------------------------------------

/// Declared maximum lengths (in characters) of every bounded string column.
///
/// Values longer than these are cut down when bound into the store; they are
/// never rejected.
pub mod widths {
    pub const UUID: usize = 50;
    pub const PRODUCT: usize = 20;
    pub const VERSION: usize = 10;
    pub const BUILD: usize = 10;
    pub const SIGNATURE: usize = 255;
    pub const URL: usize = 255;
    pub const COMMENTS: usize = 500;
    pub const CPU_NAME: usize = 100;
    pub const CPU_INFO: usize = 100;
    pub const REASON: usize = 255;
    pub const ADDRESS: usize = 20;
    pub const OS_NAME: usize = 100;
    pub const OS_VERSION: usize = 100;

    pub const MODULE_NAME: usize = 50;
    pub const FUNCTION: usize = 100;
    pub const SOURCE: usize = 200;
    pub const INSTRUCTION: usize = 10;
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Cut `value` down to at most `max_chars` characters without splitting a
/// code point.
pub fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// [`truncate_chars`] lifted over an optional column value.
pub fn truncate_opt(value: Option<&str>, max_chars: usize) -> Option<&str> {
    value.map(|v| truncate_chars(v, max_chars))
}

/// Compute a SHA-256 hex digest of the given signature string (or "" if None).
pub fn signature_hash(signature: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature.unwrap_or_default().as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One stack-trace entry of a report.
///
/// `(report_id, frame_num)` identifies a frame once the owning report has been
/// stored. `thread_num` is only known at ingestion time and is not persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub report_id: Option<i64>,
    pub thread_num: Option<String>,
    pub frame_num: u32,
    pub module_name: Option<String>,
    pub function: Option<String>,
    pub source: Option<String>,
    pub source_line: Option<u32>,
    pub instruction: Option<String>,
}

// ---------------------------------------------------------------------------
// Dump
// ---------------------------------------------------------------------------

/// The raw crash dump text of a report, preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dump {
    pub report_id: Option<i64>,
    pub data: String,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One crash submission together with its frames and dump.
///
/// Frames are always held in ascending `frame_num` order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Option<i64>,
    pub date: DateTime<Utc>,
    pub uuid: String,
    pub product: Option<String>,
    pub version: Option<String>,
    pub build: Option<String>,
    pub signature: Option<String>,
    pub url: Option<String>,
    pub install_age: Option<i64>,
    pub last_crash: Option<i64>,
    pub comments: Option<String>,
    pub cpu_name: Option<String>,
    pub cpu_info: Option<String>,
    pub reason: Option<String>,
    pub address: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub frames: Vec<Frame>,
    pub dump: Option<Dump>,
}

impl Report {
    pub(crate) fn empty(uuid: String, date: DateTime<Utc>) -> Self {
        Self {
            id: None,
            date,
            uuid,
            product: None,
            version: None,
            build: None,
            signature: None,
            url: None,
            install_age: None,
            last_crash: None,
            comments: None,
            cpu_name: None,
            cpu_info: None,
            reason: None,
            address: None,
            os_name: None,
            os_version: None,
            frames: Vec::new(),
            dump: None,
        }
    }

    /// Look up a frame by its number.
    pub fn frame(&self, frame_num: u32) -> Option<&Frame> {
        self.frames
            .binary_search_by_key(&frame_num, |f| f.frame_num)
            .ok()
            .map(|idx| &self.frames[idx])
    }

    /// SHA-256 hex digest of the report signature, used to group reports.
    pub fn signature_hash(&self) -> String {
        signature_hash(self.signature.as_deref())
    }

    /// Point the frame and dump back-references at `id`.
    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
        for frame in &mut self.frames {
            frame.report_id = Some(id);
        }
        if let Some(dump) = &mut self.dump {
            dump.report_id = Some(id);
        }
    }
}
