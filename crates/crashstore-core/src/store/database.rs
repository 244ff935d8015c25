//! SQLite storage layer.
//!
//! A single connection guarded by a mutex serves every call, so an in-memory
//! database lives as long as the store does.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::config::{DatabaseLocation, StoreConfig};
use crate::errors::{CrashStoreError, CrashStoreResult};
use crate::models::{signature_hash, truncate_chars, truncate_opt, widths, Dump, Frame, Report};
use crate::store::schema;
use crate::store::{item_key, FetchCounters, FetchStats, ReportStore, SignatureCount};

/// Counter item recorded by [`SqliteStore::load_by_uuid`].
pub const REPORT_FETCH_ITEM: &str = "report";

const REPORT_COLUMNS: &str = "id, date, uuid, product, version, build, signature, url, \
     install_age, last_crash, comments, cpu_name, cpu_info, reason, address, os_name, os_version";

// ---------------------------------------------------------------------------
// Helper: path resolution
// ---------------------------------------------------------------------------

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

/// Expand `~` and anchor relative paths at the current directory.
fn resolve_path(path: &Path) -> CrashStoreResult<PathBuf> {
    let expanded = expand_tilde(&path.to_string_lossy());
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}

// ---------------------------------------------------------------------------
// Helper: row mapping
// ---------------------------------------------------------------------------

fn parse_date(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn report_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: Some(row.get(0)?),
        date: parse_date(1, row.get(1)?)?,
        uuid: row.get(2)?,
        product: row.get(3)?,
        version: row.get(4)?,
        build: row.get(5)?,
        signature: row.get(6)?,
        url: row.get(7)?,
        install_age: row.get(8)?,
        last_crash: row.get(9)?,
        comments: row.get(10)?,
        cpu_name: row.get(11)?,
        cpu_info: row.get(12)?,
        reason: row.get(13)?,
        address: row.get(14)?,
        os_name: row.get(15)?,
        os_version: row.get(16)?,
        frames: Vec::new(),
        dump: None,
    })
}

fn frame_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Frame> {
    Ok(Frame {
        report_id: Some(row.get(0)?),
        thread_num: None,
        frame_num: row.get(1)?,
        module_name: row.get(2)?,
        function: row.get(3)?,
        source: row.get(4)?,
        source_line: row.get(5)?,
        instruction: row.get(6)?,
    })
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// SQLite-backed [`ReportStore`] and [`FetchCounters`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (creating if needed) the database named by `config` and bring its
    /// schema up to date. Parent directories of a file database are created.
    pub fn open(config: &StoreConfig) -> CrashStoreResult<Self> {
        config.validate()?;
        let (conn, db_path) = match &config.database {
            DatabaseLocation::InMemory => (Connection::open_in_memory()?, None),
            DatabaseLocation::Path(path) => {
                let resolved = resolve_path(path)?;
                if let Some(parent) = resolved.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let conn = Connection::open(&resolved)?;
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                (conn, Some(resolved))
            }
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;
        debug!(path = ?db_path, "opened crash store");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Create all tables and indexes, then run pending migrations.
    fn init_schema(conn: &Connection) -> CrashStoreResult<()> {
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(conn)
    }

    /// Resolved database file, or `None` for an in-memory store.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn schema_version(&self) -> i32 {
        schema::get_schema_version(&self.conn.lock())
    }

    pub fn report_count(&self) -> CrashStoreResult<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM reports;", [], |row| row.get(0))?)
    }

    /// Create a backup of the database at `destination` using the SQLite
    /// backup API.  Returns the resolved path.
    pub fn backup_to(&self, destination: &Path) -> CrashStoreResult<PathBuf> {
        let resolved = resolve_path(destination)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let src_conn = self.conn.lock();
        let mut dst_conn = Connection::open(&resolved)?;
        let backup = rusqlite::backup::Backup::new(&src_conn, &mut dst_conn)?;
        backup.run_to_completion(100, Duration::from_millis(10), None)?;
        Ok(resolved)
    }

    fn load_with(conn: &Connection, id: i64) -> CrashStoreResult<Option<Report>> {
        let report = conn
            .query_row(
                &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1;"),
                params![id],
                report_from_row,
            )
            .optional()?;
        let Some(mut report) = report else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT report_id, frame_num, module_name, function, source, source_line, instruction \
             FROM frames WHERE report_id = ?1 ORDER BY frame_num ASC;",
        )?;
        report.frames = stmt
            .query_map(params![id], frame_from_row)?
            .collect::<Result<_, _>>()?;

        report.dump = conn
            .query_row(
                "SELECT data FROM dumps WHERE report_id = ?1;",
                params![id],
                |row| {
                    Ok(Dump {
                        report_id: Some(id),
                        data: row.get(0)?,
                    })
                },
            )
            .optional()?;
        report.assign_id(id);
        Ok(Some(report))
    }

    fn bump_counter(conn: &Connection, item: &str, hit: bool) -> CrashStoreResult<()> {
        let (hits, misses) = if hit { (1, 0) } else { (0, 1) };
        conn.execute(
            "INSERT INTO fetch_counters(item_key, item, hits, misses) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(item_key) DO UPDATE SET \
                 hits = hits + excluded.hits, \
                 misses = misses + excluded.misses;",
            params![item_key(item), item, hits, misses],
        )?;
        Ok(())
    }
}

impl ReportStore for SqliteStore {
    fn save(&self, report: &Report) -> CrashStoreResult<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let uuid = truncate_chars(&report.uuid, widths::UUID);
        let existing: Option<i64> = tx
            .query_row("SELECT id FROM reports WHERE uuid = ?1;", params![uuid], |row| {
                row.get(0)
            })
            .optional()?;
        if existing.is_some() {
            return Err(CrashStoreError::DuplicateUuid(report.uuid.clone()));
        }

        let signature = truncate_opt(report.signature.as_deref(), widths::SIGNATURE);
        tx.execute(
            "INSERT INTO reports ( \
                 date, uuid, product, version, build, signature, signature_hash, url, \
                 install_age, last_crash, comments, cpu_name, cpu_info, reason, address, \
                 os_name, os_version \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
            params![
                report.date.to_rfc3339(),
                uuid,
                truncate_opt(report.product.as_deref(), widths::PRODUCT),
                truncate_opt(report.version.as_deref(), widths::VERSION),
                truncate_opt(report.build.as_deref(), widths::BUILD),
                signature,
                signature_hash(signature),
                truncate_opt(report.url.as_deref(), widths::URL),
                report.install_age,
                report.last_crash,
                truncate_opt(report.comments.as_deref(), widths::COMMENTS),
                truncate_opt(report.cpu_name.as_deref(), widths::CPU_NAME),
                truncate_opt(report.cpu_info.as_deref(), widths::CPU_INFO),
                truncate_opt(report.reason.as_deref(), widths::REASON),
                truncate_opt(report.address.as_deref(), widths::ADDRESS),
                truncate_opt(report.os_name.as_deref(), widths::OS_NAME),
                truncate_opt(report.os_version.as_deref(), widths::OS_VERSION),
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO frames ( \
                     report_id, frame_num, module_name, function, source, source_line, instruction \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            )?;
            for frame in &report.frames {
                stmt.execute(params![
                    id,
                    frame.frame_num,
                    truncate_opt(frame.module_name.as_deref(), widths::MODULE_NAME),
                    truncate_opt(frame.function.as_deref(), widths::FUNCTION),
                    truncate_opt(frame.source.as_deref(), widths::SOURCE),
                    frame.source_line,
                    truncate_opt(frame.instruction.as_deref(), widths::INSTRUCTION),
                ])?;
            }
        }

        if let Some(dump) = &report.dump {
            tx.execute(
                "INSERT INTO dumps(report_id, data) VALUES (?1, ?2);",
                params![id, dump.data],
            )?;
        }

        tx.commit()?;
        debug!(id, uuid = %report.uuid, frames = report.frames.len(), "stored crash report");
        Ok(id)
    }

    fn load(&self, id: i64) -> CrashStoreResult<Option<Report>> {
        let conn = self.conn.lock();
        Self::load_with(&conn, id)
    }

    fn load_by_uuid(&self, uuid: &str) -> CrashStoreResult<Option<Report>> {
        let conn = self.conn.lock();
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM reports WHERE uuid = ?1;",
                params![truncate_chars(uuid, widths::UUID)],
                |row| row.get(0),
            )
            .optional()?;
        Self::bump_counter(&conn, REPORT_FETCH_ITEM, id.is_some())?;
        match id {
            Some(id) => Self::load_with(&conn, id),
            None => Ok(None),
        }
    }

    fn delete(&self, id: i64) -> CrashStoreResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM reports WHERE id = ?1;", params![id])?;
        debug!(id, removed, "deleted crash report");
        Ok(removed > 0)
    }

    fn top_signatures(
        &self,
        product: Option<&str>,
        version: Option<&str>,
        limit: usize,
    ) -> CrashStoreResult<Vec<SignatureCount>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT signature, COUNT(*) AS n FROM reports \
             WHERE signature IS NOT NULL \
               AND (?1 IS NULL OR product = ?1) \
               AND (?2 IS NULL OR version = ?2) \
             GROUP BY signature \
             ORDER BY n DESC, signature ASC \
             LIMIT ?3;",
        )?;
        let rows = stmt
            .query_map(
                params![
                    truncate_opt(product, widths::PRODUCT),
                    truncate_opt(version, widths::VERSION),
                    i64::try_from(limit).unwrap_or(i64::MAX),
                ],
                |row| {
                    Ok(SignatureCount {
                        signature: row.get(0)?,
                        count: row.get(1)?,
                    })
                },
            )?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

impl FetchCounters for SqliteStore {
    fn record_hit(&self, item: &str) -> CrashStoreResult<()> {
        Self::bump_counter(&self.conn.lock(), item, true)
    }

    fn record_miss(&self, item: &str) -> CrashStoreResult<()> {
        Self::bump_counter(&self.conn.lock(), item, false)
    }

    fn fetch_stats(&self, item: &str) -> CrashStoreResult<FetchStats> {
        let conn = self.conn.lock();
        let counts: Option<(i64, i64)> = conn
            .query_row(
                "SELECT hits, misses FROM fetch_counters WHERE item_key = ?1;",
                params![item_key(item)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (hits, misses) = counts.unwrap_or_default();
        Ok(FetchStats {
            hits: hits.max(0) as u64,
            misses: misses.max(0) as u64,
        })
    }
}
