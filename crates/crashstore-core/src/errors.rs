//! Error types for the crash store library.

/// Top-level error enum for ingestion and storage.
#[derive(Debug, thiserror::Error)]
pub enum CrashStoreError {
    #[error("Duplicate frame: frame_num {frame_num} already present in this report")]
    DuplicateFrame { frame_num: u32 },

    #[error("Report already finished; it can no longer be modified")]
    AlreadyFinished,

    #[error("Dump text already finalized")]
    DumpAlreadyFinalized,

    #[error("Duplicate report uuid: {0}")]
    DuplicateUuid(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrashStoreError {
    /// True for errors raised by the report lifecycle itself (as opposed to
    /// I/O or storage failures). Ingestion of the affected report should be
    /// abandoned.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CrashStoreError::DuplicateFrame { .. }
                | CrashStoreError::AlreadyFinished
                | CrashStoreError::DumpAlreadyFinalized
        )
    }
}

pub type CrashStoreResult<T> = Result<T, CrashStoreError>;
