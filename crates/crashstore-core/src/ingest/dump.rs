//! Incremental accumulation of raw dump text.

use crate::errors::{CrashStoreError, CrashStoreResult};
use crate::models::Dump;

/// Buffers every consumed chunk of a dump stream, terminators included, so
/// that the finalized [`Dump`] reproduces the input byte for byte.
#[derive(Debug, Default)]
pub struct DumpText {
    buffer: String,
    finalized: bool,
}

impl DumpText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` to the buffer.
    pub fn append(&mut self, text: &str) -> CrashStoreResult<()> {
        if self.finalized {
            return Err(CrashStoreError::DumpAlreadyFinalized);
        }
        self.buffer.push_str(text);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Produce the immutable [`Dump`] for `report_id`. May only be called once.
    pub fn finalize(&mut self, report_id: Option<i64>) -> CrashStoreResult<Dump> {
        if self.finalized {
            return Err(CrashStoreError::DumpAlreadyFinalized);
        }
        self.finalized = true;
        Ok(Dump {
            report_id,
            data: std::mem::take(&mut self.buffer),
        })
    }
}
