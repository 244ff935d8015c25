//! Crash report ingestion and storage.
//!
//! Crash dumps arrive as line-oriented text: a header of `KEY|value|...`
//! lines closed by an empty line, followed by one pipe-delimited line per
//! stack frame. The [`ingest`] layer turns such a stream into a [`Report`]
//! with ordered [`Frame`]s, a derived signature and the verbatim [`Dump`];
//! the [`store`] layer persists finished reports in SQLite.
//!
//! ```no_run
//! use std::io::Cursor;
//!
//! use crashstore_core::config::StoreConfig;
//! use crashstore_core::ingest::pipeline::ingest_stream;
//! use crashstore_core::store::database::SqliteStore;
//! use crashstore_core::store::ReportStore;
//!
//! # fn main() -> crashstore_core::errors::CrashStoreResult<()> {
//! let config = StoreConfig::in_memory();
//! let store = SqliteStore::open(&config)?;
//! let dump = "Crash|SIGSEGV|0xdead|0\n\n0|0|libc.so|abort|||0x10\n";
//! let report = ingest_stream("8d5c1f0e", &mut Cursor::new(dump), &config.ingest)?;
//! store.save(&report)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod store;

pub use errors::{CrashStoreError, CrashStoreResult};
pub use models::{Dump, Frame, Report};
