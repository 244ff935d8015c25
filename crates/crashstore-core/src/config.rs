//! Store and ingestion configuration.
//!
//! Everything is passed in explicitly; nothing is inferred from the process
//! environment. Configuration files are JSON and every field has a default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{CrashStoreError, CrashStoreResult};

/// Where the SQLite database lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseLocation {
    InMemory,
    Path(PathBuf),
}

impl Default for DatabaseLocation {
    fn default() -> Self {
        DatabaseLocation::Path(PathBuf::from("crashstore.db"))
    }
}

/// Which body frames are attached to the report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRouting {
    /// Only frames of the thread named by the header's `Crash` line. When
    /// that thread has no frames, or the header names none, the first thread
    /// seen in the body is used.
    #[default]
    CrashedThread,
    /// Every decodable body line becomes a frame. Frame numbers must then be
    /// unique across all threads.
    AllThreads,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    pub routing: FrameRouting,
    /// Rayon pool size for directory ingestion.
    pub workers: usize,
    /// Extension (without the dot) of dump files picked up from a directory.
    pub extension: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            routing: FrameRouting::CrashedThread,
            workers: 4,
            extension: "txt".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: DatabaseLocation,
    pub busy_timeout_ms: u64,
    pub ingest: IngestOptions,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::default(),
            busy_timeout_ms: 5000,
            ingest: IngestOptions::default(),
        }
    }
}

impl StoreConfig {
    /// In-memory database with default ingestion options; handy for tests.
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseLocation::InMemory,
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> CrashStoreResult<Self> {
        let config: StoreConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> CrashStoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> CrashStoreResult<()> {
        if self.ingest.workers == 0 {
            return Err(CrashStoreError::Config(
                "ingest.workers must be at least 1".to_string(),
            ));
        }
        if self.ingest.extension.is_empty() || self.ingest.extension.starts_with('.') {
            return Err(CrashStoreError::Config(format!(
                "ingest.extension must be a bare extension, got {:?}",
                self.ingest.extension
            )));
        }
        if let DatabaseLocation::Path(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(CrashStoreError::Config("database path is empty".to_string()));
            }
        }
        Ok(())
    }
}
